use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::{ChangeKind, EffectConfig, EffectConfigPatch};
use crate::models::constraints::CaptureConstraints;
use crate::models::device::Device;
use crate::models::error::PipelineError;
use crate::models::levels::{AudioLevels, PipelineDiagnostics};
use crate::models::state::PipelineState;
use crate::processing::effect_graph::{EffectGraphBuilder, GraphSnapshot};
use crate::storage::settings::PersistedSettings;
use crate::traits::capture_backend::{AudioBufferCallback, CaptureBackend};
use crate::traits::notification_sink::{NotificationSink, Severity};
use crate::traits::pipeline_observer::PipelineObserver;
use crate::traits::settings_store::SettingsStore;
use crate::traits::transport::Transport;

use super::capture_session::CaptureSession;
use super::device_catalog::DeviceCatalog;
use super::publisher::{OutputPublisher, StreamHandle, StreamListener};
use super::signal_path::SignalPath;

/// Why a structural rebuild was requested. Coalesced requests merge.
#[derive(Debug, Clone, Copy, Default)]
struct RebuildRequest {
    device_switch: bool,
}

impl RebuildRequest {
    fn merge(self, other: Self) -> Self {
        Self {
            device_switch: self.device_switch || other.device_switch,
        }
    }
}

/// Internal mutable controller state, protected by `parking_lot::Mutex`.
struct ControllerState {
    state: PipelineState,
    config: EffectConfig,
    catalog: DeviceCatalog,
    path: Option<Arc<SignalPath>>,
    rebuild_in_flight: bool,
    pending: Option<RebuildRequest>,
    /// Bumped by `shutdown`; a rebuild that started in an older epoch is discarded.
    epoch: u64,
    diagnostics: PipelineDiagnostics,
}

/// Orchestrates capture, effect graph and output publication for one local user.
///
/// Every configuration change is classified before it is applied:
/// ```text
/// IN_PLACE    → retune the live graph, stream identity unchanged
/// STRUCTURAL  → close capture → open capture → build graph → publish → live
/// ```
/// Structural rebuilds are serialized. Requests arriving while one is in flight
/// collapse into a single follow-up rebuild that reads the latest config.
///
/// Platform failures never escape: they become a notification, a log record and
/// a `Failed` state. Recovery takes another structural change.
pub struct PipelineController {
    backend: Arc<dyn CaptureBackend>,
    notifier: Arc<dyn NotificationSink>,
    session: CaptureSession,
    publisher: OutputPublisher,
    settings: Option<Arc<dyn SettingsStore>>,
    observers: Mutex<Vec<Arc<dyn PipelineObserver>>>,
    inner: Mutex<ControllerState>,
    frames_processed: Arc<AtomicU64>,
}

impl PipelineController {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        notifier: Arc<dyn NotificationSink>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut catalog = DeviceCatalog::default();
        catalog.refresh(backend.as_ref());

        Self {
            session: CaptureSession::new(Arc::clone(&backend)),
            publisher: OutputPublisher::new(transport),
            backend,
            notifier,
            settings: None,
            observers: Mutex::new(Vec::new()),
            inner: Mutex::new(ControllerState {
                state: PipelineState::Idle,
                config: EffectConfig::default(),
                catalog,
                path: None,
                rebuild_in_flight: false,
                pending: None,
                epoch: 0,
                diagnostics: PipelineDiagnostics::default(),
            }),
            frames_processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Restore persisted choices from `store` and save every later change to it.
    pub fn with_settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        match store.load() {
            Ok(Some(saved)) => {
                {
                    let mut inner = self.inner.lock();
                    match saved.effects.validate() {
                        Ok(()) => inner.config = saved.effects,
                        Err(e) => log::warn!("Ignoring persisted effect config: {}", e),
                    }
                    inner
                        .catalog
                        .restore_selection(saved.capture_device_id, saved.render_device_id);
                }
                self.publisher.set_capture_muted(&self.session, saved.capture_muted);
                self.publisher.set_render_muted(saved.render_muted);
                log::info!("Restored audio settings");
            }
            Ok(None) => log::debug!("No persisted audio settings"),
            Err(e) => log::warn!("Failed to load audio settings: {}", e),
        }
        self.settings = Some(store);
        self
    }

    pub fn add_observer(&self, observer: Arc<dyn PipelineObserver>) {
        self.observers.lock().push(observer);
    }

    // --- Accessors ---

    pub fn state(&self) -> PipelineState {
        self.inner.lock().state.clone()
    }

    pub fn config(&self) -> EffectConfig {
        self.inner.lock().config.clone()
    }

    pub fn capture_devices(&self) -> Vec<Device> {
        self.inner.lock().catalog.capture_devices().to_vec()
    }

    pub fn render_devices(&self) -> Vec<Device> {
        self.inner.lock().catalog.render_devices().to_vec()
    }

    /// Capture device in effect: the explicit choice if present, else the first one.
    pub fn selected_capture_device(&self) -> Option<Device> {
        self.inner.lock().catalog.effective_capture().cloned()
    }

    pub fn selected_render_device(&self) -> Option<Device> {
        self.inner.lock().catalog.effective_render().cloned()
    }

    pub fn is_capture_muted(&self) -> bool {
        self.publisher.is_capture_muted()
    }

    pub fn is_render_muted(&self) -> bool {
        self.publisher.is_render_muted()
    }

    pub fn current_levels(&self) -> AudioLevels {
        let path = self.inner.lock().path.clone();
        path.map(|p| p.levels()).unwrap_or_default()
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        let mut diagnostics = self.inner.lock().diagnostics.clone();
        diagnostics.frames_processed = self.frames_processed.load(Ordering::Relaxed);
        diagnostics
    }

    /// Stages and parameters of the live graph.
    pub fn graph_snapshot(&self) -> Option<GraphSnapshot> {
        let path = self.inner.lock().path.clone();
        path.and_then(|p| p.snapshot())
    }

    // --- Output ---

    /// Last published processed stream.
    pub fn current_output(&self) -> Option<StreamHandle> {
        self.publisher.current()
    }

    /// Fired once per completed structural rebuild.
    pub fn on_output_changed(&self, listener: StreamListener) {
        self.publisher.on_changed(listener);
    }

    // --- Mutators ---

    /// First use: open the pipeline unless it is already live or opening.
    ///
    /// A rebuild still unwinding after `shutdown` does not count as opening;
    /// the request queues behind it.
    pub fn start(&self) -> ChangeKind {
        {
            let inner = self.inner.lock();
            if inner.state.is_live() || (inner.rebuild_in_flight && inner.state.is_transitioning()) {
                return ChangeKind::Unchanged;
            }
        }
        self.request_rebuild(RebuildRequest::default());
        ChangeKind::Structural
    }

    /// Merge `patch` into the effect config and apply it.
    ///
    /// Only a patch that yields an invalid config is rejected.
    pub fn configure(&self, patch: EffectConfigPatch) -> Result<ChangeKind, PipelineError> {
        let (kind, config, rebuild) = {
            let mut inner = self.inner.lock();
            let next = inner.config.merged(&patch);
            next.validate().map_err(PipelineError::InvalidConfig)?;

            let kind = ChangeKind::classify(&inner.config, &next);
            if kind == ChangeKind::Unchanged {
                return Ok(kind);
            }
            let previous = std::mem::replace(&mut inner.config, next.clone());

            if kind == ChangeKind::InPlace {
                // Without a live graph the change only lands in the config; a
                // graph being built picks it up before it is installed.
                let retuned = inner.path.as_ref().and_then(|p| p.apply_parameters(&next));
                let output_changed = previous.output_gain != next.output_gain
                    || previous.latency_hint_ms != next.latency_hint_ms;
                if let Some(stages) = retuned.filter(|&n| n > 0 || output_changed) {
                    inner.diagnostics.in_place_updates += 1;
                    log::debug!("Applied in-place update to {} stage(s)", stages);
                }
            }
            let rebuild = kind == ChangeKind::Structural && !inner.state.is_idle();
            (kind, next, rebuild)
        };

        self.persist();
        self.notify_observers(|o| o.on_config_changed(&config));
        if rebuild {
            self.request_rebuild(RebuildRequest::default());
        }
        Ok(kind)
    }

    /// Switch capture device. Unknown or already selected ids are ignored.
    pub fn select_capture_device(&self, id: &str) -> ChangeKind {
        let rebuild = {
            let mut inner = self.inner.lock();
            let before = inner.catalog.effective_capture().map(|d| d.id.clone());
            if !inner.catalog.select_capture(id) {
                log::debug!("Capture device {} unknown or already selected", id);
                return ChangeKind::Unchanged;
            }
            // Live on the same physical device: constraints are unchanged.
            !(inner.state.is_live() && before.as_deref() == Some(id))
        };

        self.persist();
        if rebuild {
            self.request_rebuild(RebuildRequest { device_switch: true });
            ChangeKind::Structural
        } else {
            ChangeKind::Unchanged
        }
    }

    /// Render device choice is recorded and persisted; it never touches capture.
    pub fn select_render_device(&self, id: &str) -> ChangeKind {
        if !self.inner.lock().catalog.select_render(id) {
            return ChangeKind::Unchanged;
        }
        log::info!("Render device set to {}", id);
        self.persist();
        ChangeKind::InPlace
    }

    pub fn set_capture_muted(&self, muted: bool) -> ChangeKind {
        if !self.publisher.set_capture_muted(&self.session, muted) {
            return ChangeKind::Unchanged;
        }
        self.persist();
        ChangeKind::InPlace
    }

    pub fn set_render_muted(&self, muted: bool) -> ChangeKind {
        if !self.publisher.set_render_muted(muted) {
            return ChangeKind::Unchanged;
        }
        self.persist();
        ChangeKind::InPlace
    }

    /// Re-enumerate devices (device-change notification entry point).
    ///
    /// A live or opening pipeline whose effective capture device changed is
    /// rebuilt; mid-rebuild the request coalesces into one follow-up.
    pub fn refresh_devices(&self) {
        // Enumeration may block; keep it outside the lock.
        let result = self.backend.enumerate_devices();
        let (capture, render, rebuild) = {
            let mut inner = self.inner.lock();
            let before = inner.catalog.effective_capture().map(|d| d.id.clone());
            if !inner.catalog.update(result) {
                return;
            }
            let after = inner.catalog.effective_capture().map(|d| d.id.clone());
            let active = inner.state.is_live() || (inner.rebuild_in_flight && inner.state.is_transitioning());
            (
                inner.catalog.capture_devices().to_vec(),
                inner.catalog.render_devices().to_vec(),
                active && before != after,
            )
        };

        self.notify_observers(|o| o.on_devices_changed(&capture, &render));
        if rebuild {
            log::info!("Effective capture device changed; rebuilding");
            self.request_rebuild(RebuildRequest { device_switch: true });
        }
    }

    /// Detect a live capture the platform has ended (e.g. device unplugged).
    ///
    /// Returns `true` while the pipeline is live and healthy.
    pub fn check_liveness(&self) -> bool {
        let (error, path) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_live() {
                return false;
            }
            if self.session.is_live() {
                return true;
            }
            let device = inner
                .catalog
                .effective_capture()
                .map(|d| d.display_name.clone())
                .or_else(|| self.session.device_id())
                .unwrap_or_default();
            let error = PipelineError::CaptureEnded { device };
            inner.state = PipelineState::Failed(error.clone());
            (error, inner.path.take())
        };

        self.session.close();
        if let Some(path) = path {
            path.teardown();
        }
        log::error!("{}", error);
        self.notifier.notify(&error.to_string(), Severity::Error);
        self.emit_state(PipelineState::Failed(error));
        false
    }

    /// Release the capture and graph. Safe from any state, any number of times.
    pub fn shutdown(&self) {
        let (path, was_idle) = {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.pending = None;
            let was_idle = inner.state.is_idle();
            inner.state = PipelineState::Idle;
            (inner.path.take(), was_idle)
        };

        let closed = self.session.close();
        if let Some(path) = path {
            path.teardown();
        }
        if !was_idle || closed {
            log::info!("Pipeline shut down");
            self.emit_state(PipelineState::Idle);
        }
    }

    // --- Rebuild machinery ---

    /// Run a structural rebuild now, or fold it into the one in flight.
    fn request_rebuild(&self, request: RebuildRequest) {
        {
            let mut inner = self.inner.lock();
            if inner.rebuild_in_flight {
                let merged = inner.pending.map_or(request, |p| p.merge(request));
                inner.pending = Some(merged);
                inner.diagnostics.rebuilds_coalesced += 1;
                log::debug!("Rebuild in flight; request coalesced");
                return;
            }
            inner.rebuild_in_flight = true;
        }

        let mut next = Some(request);
        while let Some(request) = next {
            self.rebuild_once(request);
            let mut inner = self.inner.lock();
            next = inner.pending.take();
            if next.is_none() {
                inner.rebuild_in_flight = false;
            }
        }
    }

    fn rebuild_once(&self, request: RebuildRequest) {
        let (constraints, config, epoch, device_name, previous, entering) = {
            let mut inner = self.inner.lock();
            let device = inner.catalog.effective_capture().cloned();
            let constraints =
                CaptureConstraints::from_config(&inner.config, device.as_ref().map(|d| d.id.as_str()));
            let entering = if inner.state.is_live() {
                PipelineState::Rebuilding
            } else {
                PipelineState::Opening
            };
            inner.state = entering.clone();
            (
                constraints,
                inner.config.clone(),
                inner.epoch,
                device.map(|d| d.display_name),
                inner.path.take(),
                entering,
            )
        };
        log::info!("Pipeline {} (device: {:?})", entering.name(), constraints.device_id);
        self.emit_state(entering);

        // Close before open: the platform never holds two captures for us.
        self.session.close();
        if let Some(previous) = previous {
            previous.teardown();
        }

        let path = Arc::new(SignalPath::new(Arc::clone(&self.frames_processed)));
        let callback: AudioBufferCallback = {
            let path = Arc::clone(&path);
            Arc::new(move |samples: &[f32], sample_rate: f64, channels: u16| {
                path.process(samples, sample_rate, channels);
            })
        };

        let format = match self.session.open(&constraints, callback) {
            Ok(format) => format,
            Err(e) => {
                self.fail(epoch, e.into());
                return;
            }
        };

        let graph = match EffectGraphBuilder::build(format, &config) {
            Ok(graph) => graph,
            Err(e) => {
                self.session.close();
                self.fail(epoch, e.into());
                return;
            }
        };

        let device_id = self.session.device_id().unwrap_or_default();
        let stream = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                drop(inner);
                log::info!("Pipeline shut down during rebuild; discarding new capture");
                self.session.close();
                return;
            }

            let mut graph = graph;
            let retuned = graph.apply_parameters(&inner.config);
            if retuned > 0 {
                log::debug!("Re-synced {} stage(s) changed during rebuild", retuned);
            }
            let stream = StreamHandle::new(format, device_id, inner.config.latency_hint_ms);
            path.install(graph, stream.clone());
            inner.path = Some(path);
            inner.state = PipelineState::Live;
            inner.diagnostics.rebuilds_completed += 1;
            stream
        };

        self.publisher.publish(stream);
        self.emit_state(PipelineState::Live);

        if request.device_switch {
            let name = device_name.unwrap_or_else(|| "default device".to_string());
            self.notifier
                .notify(&format!("Switched microphone to {}", name), Severity::Info);
        }
    }

    fn fail(&self, epoch: u64, error: PipelineError) {
        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                return;
            }
            inner.state = PipelineState::Failed(error.clone());
            inner.diagnostics.rebuilds_failed += 1;
        }
        log::error!("Pipeline rebuild failed: {}", error);
        self.notifier.notify(&error.to_string(), Severity::Error);
        self.emit_state(PipelineState::Failed(error));
    }

    // --- Internal helpers ---

    fn emit_state(&self, state: PipelineState) {
        log::debug!("Pipeline state: {}", state.name());
        self.notify_observers(|o| o.on_state_changed(&state));
    }

    fn notify_observers(&self, f: impl Fn(&dyn PipelineObserver)) {
        let observers = self.observers.lock().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    fn persist(&self) {
        let Some(store) = &self.settings else {
            return;
        };
        let settings = {
            let inner = self.inner.lock();
            PersistedSettings {
                capture_device_id: inner.catalog.selected_capture().map(str::to_string),
                render_device_id: inner.catalog.selected_render().map(str::to_string),
                effects: inner.config.clone(),
                capture_muted: self.publisher.is_capture_muted(),
                render_muted: self.publisher.is_render_muted(),
                saved_at: None,
            }
        };
        if let Err(e) = store.save(&settings) {
            log::warn!("Failed to save audio settings: {}", e);
        }
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
