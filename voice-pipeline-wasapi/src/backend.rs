use voice_pipeline_core::models::constraints::CaptureConstraints;
use voice_pipeline_core::models::device::Device;
use voice_pipeline_core::models::error::{CaptureOpenError, DeviceEnumerationError};
use voice_pipeline_core::traits::capture_backend::{AudioBufferCallback, CaptureBackend, LiveCapture};

use crate::com::ComGuard;
use crate::device_enumerator::DeviceEnumerator;
use crate::wasapi_mic::WasapiMicCapture;

/// WASAPI implementation of the platform capture seam.
///
/// Stateless: every call sets up COM on the calling thread as needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for WasapiBackend {
    fn enumerate_devices(&self) -> Result<Vec<Device>, DeviceEnumerationError> {
        let _com = ComGuard::enter();
        DeviceEnumerator::new()?.list_devices()
    }

    fn open(
        &self,
        constraints: &CaptureConstraints,
        callback: AudioBufferCallback,
    ) -> Result<Box<dyn LiveCapture>, CaptureOpenError> {
        log::debug!(
            "Requested {} Hz x{}; shared mode delivers the endpoint mix format",
            constraints.sample_rate_hz,
            constraints.channel_count
        );
        let capture = WasapiMicCapture::open(constraints, callback)?;
        Ok(Box::new(capture))
    }
}
