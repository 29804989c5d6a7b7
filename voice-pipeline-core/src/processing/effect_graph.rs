//! Effect chain construction and in-place parameter updates.
//!
//! The graph is a strictly ordered list of stages between one input and one
//! output, so it can never contain a cycle or a second terminal. The graph
//! owns every stage; a [`StageHandle`] is only an index into that arena and is
//! meaningless once the graph is dropped.

use std::collections::BTreeMap;

use crate::models::config::EffectConfig;
use crate::models::device::CaptureFormat;
use crate::models::error::GraphConstructionError;
use crate::models::stage::StageName;

use super::biquad::{Biquad, FilterKind, FilterParams};
use super::compressor::{Compressor, CompressorParams};

const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Parameters of one stage, as designed from an [`EffectConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageParams {
    Filter(FilterParams),
    Compressor(CompressorParams),
}

/// Parameters `name` should run with under `config`, whether or not it is enabled.
pub fn stage_params(name: StageName, config: &EffectConfig) -> StageParams {
    let filter = |kind, frequency_hz, q, gain_db| {
        StageParams::Filter(FilterParams {
            kind,
            frequency_hz,
            q,
            gain_db,
        })
    };
    match name {
        StageName::ConditioningHighPass => filter(FilterKind::HighPass, 80.0, BUTTERWORTH_Q, 0.0),
        StageName::ConditioningLowPass => filter(FilterKind::LowPass, 8000.0, BUTTERWORTH_Q, 0.0),
        StageName::VoiceEnhancement => filter(FilterKind::Peaking, 1500.0, 1.0, config.voice_clarity * 3.0),
        StageName::VoiceIsolation => {
            // More reduction narrows the pass band from 500 Hz to 300 Hz.
            let bandwidth_hz = 500.0 - 200.0 * config.background_noise_reduction;
            filter(FilterKind::BandPass, 1200.0, 1200.0 / bandwidth_hz, 0.0)
        }
        StageName::VoiceBoost => filter(FilterKind::Peaking, 1200.0, 1.0, config.voice_boost * 8.0),
        StageName::BassBoost => filter(FilterKind::LowShelf, 250.0, BUTTERWORTH_Q, config.bass_boost * 10.0),
        StageName::TrebleBoost => filter(FilterKind::HighShelf, 3000.0, BUTTERWORTH_Q, config.treble_boost * 10.0),
        StageName::Compression => {
            StageParams::Compressor(CompressorParams::voice(1.0 + config.dynamic_range_compression * 8.0))
        }
        StageName::StereoEnhancement => filter(FilterKind::Peaking, 2000.0, 0.7, 2.0),
        StageName::SpatialAudio => filter(FilterKind::Peaking, 1000.0, 0.7, 1.5),
    }
}

/// Index of a stage inside the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(usize);

#[derive(Debug, Clone)]
enum StageProcessor {
    Filter(Biquad),
    Compressor(Compressor),
}

impl StageProcessor {
    fn new(params: StageParams, format: CaptureFormat) -> Option<Self> {
        match params {
            StageParams::Filter(p) => Biquad::new(p, format.sample_rate, format.channels).map(Self::Filter),
            StageParams::Compressor(p) => {
                Compressor::new(p, format.sample_rate, format.channels).map(Self::Compressor)
            }
        }
    }

    fn params(&self) -> StageParams {
        match self {
            Self::Filter(f) => StageParams::Filter(f.params()),
            Self::Compressor(c) => StageParams::Compressor(c.params()),
        }
    }

    fn set_params(&mut self, params: StageParams) -> bool {
        match (self, params) {
            (Self::Filter(f), StageParams::Filter(p)) => f.set_params(p),
            (Self::Compressor(c), StageParams::Compressor(p)) => c.set_params(p),
            _ => false,
        }
    }

    fn process(&mut self, samples: &mut [f32]) {
        match self {
            Self::Filter(f) => f.process(samples),
            Self::Compressor(c) => c.process(samples),
        }
    }
}

#[derive(Debug, Clone)]
struct Stage {
    name: StageName,
    processor: StageProcessor,
}

/// Read-only view of a graph for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub format: CaptureFormat,
    pub stages: Vec<(StageName, StageParams)>,
    pub output_gain: f32,
}

impl GraphSnapshot {
    pub fn stage(&self, name: StageName) -> Option<StageParams> {
        self.stages.iter().find(|(n, _)| *n == name).map(|(_, p)| *p)
    }

    pub fn topology(&self) -> Vec<StageName> {
        self.stages.iter().map(|(n, _)| *n).collect()
    }
}

/// A constructed effect chain: input → stages in order → output gain → output.
#[derive(Debug, Clone)]
pub struct EffectGraph {
    format: CaptureFormat,
    stages: Vec<Stage>,
    handles: BTreeMap<StageName, StageHandle>,
    output_gain: f32,
}

impl EffectGraph {
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Stage names in processing order.
    pub fn topology(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name).collect()
    }

    /// No stages: input is wired straight to output.
    pub fn is_passthrough(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn handle(&self, name: StageName) -> Option<StageHandle> {
        self.handles.get(&name).copied()
    }

    pub fn params(&self, handle: StageHandle) -> Option<StageParams> {
        self.stages.get(handle.0).map(|s| s.processor.params())
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    pub fn set_output_gain(&mut self, linear: f32) {
        self.output_gain = linear.max(0.0);
    }

    /// Mutate one stage's parameters in place. Returns `false` if the handle is
    /// stale or the parameters were rejected (the old tuning stays active).
    pub fn update_stage(&mut self, handle: StageHandle, params: StageParams) -> bool {
        match self.stages.get_mut(handle.0) {
            Some(stage) => stage.processor.set_params(params),
            None => false,
        }
    }

    /// Bring every existing stage and the output gain in line with `config`.
    ///
    /// Only parameters change; stages that `config` would disable stay in place.
    /// Returns how many stages were retuned.
    pub fn apply_parameters(&mut self, config: &EffectConfig) -> usize {
        let mut updated = 0;
        let names: Vec<(StageName, StageHandle)> = self.handles.iter().map(|(n, h)| (*n, *h)).collect();
        for (name, handle) in names {
            let wanted = stage_params(name, config);
            if self.params(handle) == Some(wanted) {
                continue;
            }
            if self.update_stage(handle, wanted) {
                updated += 1;
            } else {
                log::warn!("Rejected parameters for stage {}: {:?}", name, wanted);
            }
        }
        self.set_output_gain(config.output_gain_linear());
        updated
    }

    /// Run interleaved samples through the chain in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        for stage in &mut self.stages {
            stage.processor.process(samples);
        }
        if (self.output_gain - 1.0).abs() > f32::EPSILON {
            let gain = self.output_gain;
            samples.iter_mut().for_each(|s| *s *= gain);
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            format: self.format,
            stages: self.stages.iter().map(|s| (s.name, s.processor.params())).collect(),
            output_gain: self.output_gain,
        }
    }
}

/// Builds effect chains from an input format and the full effect config.
pub struct EffectGraphBuilder;

impl EffectGraphBuilder {
    pub fn build(input: CaptureFormat, config: &EffectConfig) -> Result<EffectGraph, GraphConstructionError> {
        if input.sample_rate == 0 || input.channels == 0 {
            return Err(GraphConstructionError::InvalidFormat {
                sample_rate: input.sample_rate,
                channels: input.channels,
            });
        }

        let enabled = config.enabled_stages();
        let mut stages = Vec::with_capacity(enabled.len());
        let mut handles = BTreeMap::new();

        for name in StageName::CHAIN_ORDER.into_iter().filter(|n| enabled.contains(n)) {
            let processor = StageProcessor::new(stage_params(name, config), input).ok_or_else(|| {
                GraphConstructionError::UnstableStage {
                    stage: name.to_string(),
                }
            })?;
            handles.insert(name, StageHandle(stages.len()));
            stages.push(Stage { name, processor });
        }

        log::debug!(
            "Built effect graph at {} Hz x{}: [{}]",
            input.sample_rate,
            input.channels,
            stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(" -> ")
        );

        Ok(EffectGraph {
            format: input,
            stages,
            handles,
            output_gain: config.output_gain_linear(),
        })
    }
}
