//! # voice-pipeline-core
//!
//! Platform-agnostic live voice processing pipeline.
//!
//! Turns a physical capture device plus a set of effect toggles and levels into
//! one processed output stream, and decides for every configuration change
//! whether the running pipeline can be retuned in place or must be rebuilt.
//! Platform backends (Windows WASAPI) implement the `CaptureBackend` trait and
//! plug into the generic `PipelineController`.
//!
//! ## Architecture
//!
//! ```text
//! voice-pipeline-core (this crate)
//! ├── traits/       ← CaptureBackend, LiveCapture, Transport, NotificationSink, SettingsStore, PipelineObserver
//! ├── models/       ← EffectConfig, CaptureConstraints, Device, PipelineState, errors
//! ├── processing/   ← Biquad, Compressor, EffectGraphBuilder, RingBuffer, format adaptation
//! ├── session/      ← DeviceCatalog, CaptureSession, OutputPublisher, PipelineController
//! └── storage/      ← JSON settings persistence
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use models::config::{ChangeKind, EffectConfig, EffectConfigPatch};
pub use models::constraints::CaptureConstraints;
pub use models::device::{CaptureFormat, Device, Direction};
pub use models::error::{CaptureOpenError, DeviceEnumerationError, GraphConstructionError, PipelineError, SettingsError};
pub use models::levels::{AudioLevels, PipelineDiagnostics};
pub use models::stage::StageName;
pub use models::state::PipelineState;
pub use processing::effect_graph::{EffectGraph, EffectGraphBuilder, GraphSnapshot, StageHandle, StageParams};
pub use session::capture_session::CaptureSession;
pub use session::controller::PipelineController;
pub use session::device_catalog::DeviceCatalog;
pub use session::publisher::{OutputPublisher, StreamHandle, StreamListener};
pub use storage::settings::{JsonFileSettingsStore, PersistedSettings};
pub use traits::capture_backend::{AudioBufferCallback, CaptureBackend, LiveCapture};
pub use traits::notification_sink::{NotificationSink, Severity};
pub use traits::pipeline_observer::PipelineObserver;
pub use traits::settings_store::SettingsStore;
pub use traits::transport::Transport;
