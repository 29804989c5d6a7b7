use thiserror::Error;

/// Failure to open a capture device.
///
/// Surfaced to the notification sink; never propagated past the controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureOpenError {
    #[error("permission to use the microphone was denied")]
    PermissionDenied,

    #[error("capture device not found: {0}")]
    DeviceNotFound(String),

    #[error("capture device is busy: {0}")]
    DeviceBusy(String),

    #[error("failed to open capture device: {0}")]
    Unknown(String),
}

/// Platform device enumeration failed. Non-fatal: the previous catalog is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("device enumeration failed: {0}")]
pub struct DeviceEnumerationError(pub String);

/// The effect graph could not be built for the given input and config.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphConstructionError {
    #[error("invalid input format: {sample_rate} Hz, {channels} channel(s)")]
    InvalidFormat { sample_rate: u32, channels: u16 },

    #[error("stage '{stage}' produced unstable coefficients")]
    UnstableStage { stage: String },
}

/// Settings could not be loaded or saved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(String),

    #[error("settings are malformed: {0}")]
    Format(String),
}

/// Errors reported by the pipeline controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    CaptureOpen(#[from] CaptureOpenError),

    #[error("effect graph construction failed: {0}")]
    GraphConstruction(#[from] GraphConstructionError),

    #[error("capture device stopped delivering audio: {device}")]
    CaptureEnded { device: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
