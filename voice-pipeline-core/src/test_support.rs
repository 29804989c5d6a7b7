//! Scripted platform backend and recording collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use crate::models::config::EffectConfig;
use crate::models::constraints::CaptureConstraints;
use crate::models::device::{CaptureFormat, Device};
use crate::models::error::{CaptureOpenError, DeviceEnumerationError};
use crate::models::state::PipelineState;
use crate::session::publisher::StreamHandle;
use crate::traits::capture_backend::{AudioBufferCallback, CaptureBackend, LiveCapture};
use crate::traits::notification_sink::{NotificationSink, Severity};
use crate::traits::pipeline_observer::PipelineObserver;
use crate::traits::transport::Transport;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct CaptureFlags {
    enabled: AtomicBool,
    ended: AtomicBool,
}

struct LastCapture {
    callback: AudioBufferCallback,
    flags: Arc<CaptureFlags>,
    format: CaptureFormat,
}

#[derive(Default)]
struct Script {
    devices: Vec<Device>,
    enumeration_fails: bool,
    open_failures: VecDeque<CaptureOpenError>,
    format_override: Option<CaptureFormat>,
    opened: Vec<CaptureConstraints>,
    entered: Option<mpsc::Sender<()>>,
}

pub struct MockBackend {
    script: Mutex<Script>,
    gate: Mutex<bool>,
    gate_opened: Condvar,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
    last: Mutex<Option<LastCapture>>,
}

impl MockBackend {
    pub fn new(devices: Vec<Device>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                devices,
                ..Default::default()
            }),
            gate: Mutex::new(false),
            gate_opened: Condvar::new(),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    /// Two microphones and one speaker.
    pub fn with_default_devices() -> Arc<Self> {
        Self::new(vec![
            Device::capture("mic-1", "Built-in Microphone"),
            Device::capture("mic-2", "USB Headset"),
            Device::render("spk-1", "Speakers"),
        ])
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        self.script.lock().devices = devices;
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.script.lock().enumeration_fails = fail;
    }

    pub fn fail_next_open(&self, error: CaptureOpenError) {
        self.script.lock().open_failures.push_back(error);
    }

    /// Deliver this format regardless of what was requested.
    pub fn deliver_format(&self, format: CaptureFormat) {
        self.script.lock().format_override = Some(format);
    }

    /// Block every `open` until [`release_opens`](Self::release_opens).
    /// The receiver gets one message per `open` that reached the gate.
    pub fn hold_opens(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.script.lock().entered = Some(tx);
        *self.gate.lock() = true;
        rx
    }

    pub fn release_opens(&self) {
        *self.gate.lock() = false;
        self.gate_opened.notify_all();
    }

    pub fn open_calls(&self) -> usize {
        self.script.lock().opened.len()
    }

    pub fn opened_constraints(&self) -> Vec<CaptureConstraints> {
        self.script.lock().opened.clone()
    }

    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live_handles(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn capture_enabled(&self) -> bool {
        self.last
            .lock()
            .as_ref()
            .is_some_and(|c| c.flags.enabled.load(Ordering::SeqCst))
    }

    /// Simulate the device disappearing under the latest capture.
    pub fn end_capture(&self) {
        if let Some(last) = self.last.lock().as_ref() {
            last.flags.ended.store(true, Ordering::SeqCst);
        }
    }

    /// Push one buffer through the latest capture's callback, as the platform would.
    pub fn deliver(&self, samples: &[f32]) {
        let Some((callback, format, enabled)) = self.last.lock().as_ref().and_then(|c| {
            (!c.flags.ended.load(Ordering::SeqCst))
                .then(|| (c.callback.clone(), c.format, c.flags.enabled.load(Ordering::SeqCst)))
        }) else {
            return;
        };
        if enabled {
            callback(samples, format.sample_rate as f64, format.channels);
        } else {
            callback(&vec![0.0; samples.len()], format.sample_rate as f64, format.channels);
        }
    }

    fn wait_at_gate(&self) {
        let entered = self.script.lock().entered.clone();
        if let Some(tx) = entered {
            let _ = tx.send(());
        }
        let mut closed = self.gate.lock();
        while *closed {
            self.gate_opened.wait(&mut closed);
        }
    }
}

impl CaptureBackend for MockBackend {
    fn enumerate_devices(&self) -> Result<Vec<Device>, DeviceEnumerationError> {
        let script = self.script.lock();
        if script.enumeration_fails {
            return Err(DeviceEnumerationError("scripted failure".into()));
        }
        Ok(script.devices.clone())
    }

    fn open(
        &self,
        constraints: &CaptureConstraints,
        callback: AudioBufferCallback,
    ) -> Result<Box<dyn LiveCapture>, CaptureOpenError> {
        self.wait_at_gate();

        let (format, device_id) = {
            let mut script = self.script.lock();
            script.opened.push(constraints.clone());
            if let Some(error) = script.open_failures.pop_front() {
                return Err(error);
            }
            let device_id = match &constraints.device_id {
                Some(id) if !script.devices.iter().any(|d| &d.id == id) => {
                    return Err(CaptureOpenError::DeviceNotFound(id.clone()));
                }
                Some(id) => id.clone(),
                None => "default".to_string(),
            };
            let format = script.format_override.unwrap_or_else(|| constraints.requested_format());
            (format, device_id)
        };

        let flags = Arc::new(CaptureFlags {
            enabled: AtomicBool::new(true),
            ended: AtomicBool::new(false),
        });
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        *self.last.lock() = Some(LastCapture {
            callback,
            flags: flags.clone(),
            format,
        });

        Ok(Box::new(MockCapture {
            format,
            device_id,
            flags,
            live: self.live.clone(),
            stopped: false,
        }))
    }
}

struct MockCapture {
    format: CaptureFormat,
    device_id: String,
    flags: Arc<CaptureFlags>,
    live: Arc<AtomicUsize>,
    stopped: bool,
}

impl LiveCapture for MockCapture {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn is_ended(&self) -> bool {
        self.stopped || self.flags.ended.load(Ordering::SeqCst)
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.flags.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.flags.ended.store(true, Ordering::SeqCst);
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages.lock().iter().filter(|(_, s)| *s == severity).count()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.messages.lock().push((message.to_string(), severity));
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    replaced: Mutex<Vec<Uuid>>,
    remote_mutes: Mutex<Vec<bool>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replaced(&self) -> Vec<Uuid> {
        self.replaced.lock().clone()
    }

    pub fn remote_mutes(&self) -> Vec<bool> {
        self.remote_mutes.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn on_local_stream_replaced(&self, stream: &StreamHandle) {
        self.replaced.lock().push(stream.id());
    }

    fn set_remote_muted(&self, muted: bool) {
        self.remote_mutes.lock().push(muted);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<PipelineState>>,
    configs: Mutex<Vec<EffectConfig>>,
    device_updates: AtomicUsize,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<PipelineState> {
        self.states.lock().clone()
    }

    pub fn configs(&self) -> Vec<EffectConfig> {
        self.configs.lock().clone()
    }

    pub fn device_updates(&self) -> usize {
        self.device_updates.load(Ordering::SeqCst)
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_state_changed(&self, state: &PipelineState) {
        self.states.lock().push(state.clone());
    }

    fn on_config_changed(&self, config: &EffectConfig) {
        self.configs.lock().push(config.clone());
    }

    fn on_devices_changed(&self, _capture: &[Device], _render: &[Device]) {
        self.device_updates.fetch_add(1, Ordering::SeqCst);
    }
}
