use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::EffectConfig;
use crate::models::levels::AudioLevels;
use crate::processing::effect_graph::{EffectGraph, GraphSnapshot};
use crate::processing::signal::{peak_level, rms_level, FormatAdapter};

use super::publisher::StreamHandle;

struct ActiveChain {
    adapter: FormatAdapter,
    graph: EffectGraph,
    output: StreamHandle,
}

/// Everything between one capture callback and its output stream.
///
/// Shared between the controller and the platform audio thread. Buffers that
/// arrive before a graph is installed are dropped.
pub(crate) struct SignalPath {
    chain: Mutex<Option<ActiveChain>>,
    levels: Mutex<AudioLevels>,
    frames_processed: Arc<AtomicU64>,
}

impl SignalPath {
    pub(crate) fn new(frames_processed: Arc<AtomicU64>) -> Self {
        Self {
            chain: Mutex::new(None),
            levels: Mutex::new(AudioLevels::default()),
            frames_processed,
        }
    }

    pub(crate) fn install(&self, graph: EffectGraph, output: StreamHandle) {
        let adapter = FormatAdapter::new(graph.format());
        *self.chain.lock() = Some(ActiveChain { adapter, graph, output });
    }

    /// Capture callback body.
    pub(crate) fn process(&self, samples: &[f32], sample_rate: f64, channels: u16) {
        let mut chain = self.chain.lock();
        let Some(active) = chain.as_mut() else {
            return;
        };

        let mut buffer = active.adapter.adapt(samples, sample_rate, channels);
        let input_level = rms_level(&buffer);
        let input_peak = peak_level(&buffer);

        active.graph.process(&mut buffer);
        let output_level = rms_level(&buffer);
        let output_peak = peak_level(&buffer);

        active.output.write(&buffer);
        let frames = buffer.len() / active.adapter.target.channels.max(1) as usize;
        drop(chain);

        *self.levels.lock() = AudioLevels {
            input_level,
            input_peak,
            output_level,
            output_peak,
        };
        self.frames_processed.fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Retune the installed graph and stream. Returns retuned stage count, or
    /// `None` when nothing is installed.
    pub(crate) fn apply_parameters(&self, config: &EffectConfig) -> Option<usize> {
        let mut chain = self.chain.lock();
        let active = chain.as_mut()?;
        active.output.set_latency_hint(config.latency_hint_ms);
        Some(active.graph.apply_parameters(config))
    }

    pub(crate) fn snapshot(&self) -> Option<GraphSnapshot> {
        self.chain.lock().as_ref().map(|a| a.graph.snapshot())
    }

    pub(crate) fn levels(&self) -> AudioLevels {
        *self.levels.lock()
    }

    /// Uninstall the graph and end the output stream.
    pub(crate) fn teardown(&self) {
        let active = self.chain.lock().take();
        if let Some(active) = active {
            active.output.end();
        }
        *self.levels.lock() = AudioLevels::default();
    }
}
