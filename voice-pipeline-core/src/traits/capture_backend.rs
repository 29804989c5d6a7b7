use std::sync::Arc;

use crate::models::constraints::CaptureConstraints;
use crate::models::device::{CaptureFormat, Device};
use crate::models::error::{CaptureOpenError, DeviceEnumerationError};

/// Callback invoked when a raw capture buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: The actual sample rate of the delivered audio.
/// - `channels`: Number of interleaved channels.
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], f64, u16) + Send + Sync + 'static>;

/// A platform capture handle that is currently open.
///
/// Dropping the handle without calling [`stop`](LiveCapture::stop) must still
/// release the device, but callers always stop explicitly.
pub trait LiveCapture: Send {
    /// Format the platform actually delivers.
    fn format(&self) -> CaptureFormat;

    /// Identifier of the device backing this capture.
    fn device_id(&self) -> &str;

    /// Whether the platform ended the capture (device removed, stopped).
    fn is_ended(&self) -> bool;

    /// Enable or disable the tracks. A disabled capture delivers silence.
    fn set_enabled(&mut self, enabled: bool);

    /// Stop capturing and release the hardware. Called at most once.
    fn stop(&mut self);
}

/// Platform audio API: device enumeration and capture acquisition.
///
/// Implemented by:
/// - `WasapiBackend` (Windows)
/// - the scripted mock backend used in tests
pub trait CaptureBackend: Send + Sync {
    /// Enumerate capture and render endpoints, in platform order.
    fn enumerate_devices(&self) -> Result<Vec<Device>, DeviceEnumerationError>;

    /// Acquire a capture under `constraints`, delivering buffers via `callback`.
    ///
    /// May block until the platform grants or refuses the device. The callback
    /// fires on a platform audio thread, so keep processing minimal.
    fn open(
        &self,
        constraints: &CaptureConstraints,
        callback: AudioBufferCallback,
    ) -> Result<Box<dyn LiveCapture>, CaptureOpenError>;
}
