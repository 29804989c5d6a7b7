use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::constraints::CaptureConstraints;
use crate::models::device::CaptureFormat;
use crate::models::error::CaptureOpenError;
use crate::traits::capture_backend::{AudioBufferCallback, CaptureBackend, LiveCapture};

/// The single live connection to a capture device.
///
/// At most one platform capture is held at a time: `open` releases the
/// previous one before asking the platform for another.
pub struct CaptureSession {
    backend: Arc<dyn CaptureBackend>,
    live: Mutex<Option<Box<dyn LiveCapture>>>,
    enabled: AtomicBool,
}

impl CaptureSession {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            live: Mutex::new(None),
            enabled: AtomicBool::new(true),
        }
    }

    /// Open a capture under `constraints`, returning the format the platform delivers.
    ///
    /// Blocks for as long as the platform takes to grant or refuse the device.
    /// No lock is held meanwhile.
    pub fn open(
        &self,
        constraints: &CaptureConstraints,
        callback: AudioBufferCallback,
    ) -> Result<CaptureFormat, CaptureOpenError> {
        self.close();

        let mut capture = self.backend.open(constraints, callback)?;
        capture.set_enabled(self.enabled.load(Ordering::SeqCst));
        let format = capture.format();
        log::info!(
            "Capture opened on {} at {} Hz x{}",
            capture.device_id(),
            format.sample_rate,
            format.channels
        );

        let stray = self.live.lock().replace(capture);
        if let Some(mut stray) = stray {
            log::warn!("Replaced a capture that was opened concurrently");
            stray.stop();
        }
        Ok(format)
    }

    /// Stop and release the current capture. Safe to call repeatedly.
    ///
    /// Returns `true` if a capture was actually released.
    pub fn close(&self) -> bool {
        let previous = self.live.lock().take();
        match previous {
            Some(mut capture) => {
                capture.stop();
                log::debug!("Capture on {} closed", capture.device_id());
                true
            }
            None => false,
        }
    }

    /// `true` iff a capture is held and the platform has not ended it.
    pub fn is_live(&self) -> bool {
        self.live.lock().as_ref().is_some_and(|c| !c.is_ended())
    }

    /// Enable or disable the capture tracks. Survives reopening.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if let Some(capture) = self.live.lock().as_mut() {
            capture.set_enabled(enabled);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn device_id(&self) -> Option<String> {
        self.live.lock().as_ref().map(|c| c.device_id().to_string())
    }

    pub fn format(&self) -> Option<CaptureFormat> {
        self.live.lock().as_ref().map(|c| c.format())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockBackend;

    fn noop() -> AudioBufferCallback {
        Arc::new(|_: &[f32], _: f64, _: u16| {})
    }

    #[test]
    fn open_releases_previous_capture_first() {
        let backend = MockBackend::with_default_devices();
        let session = CaptureSession::new(backend.clone());

        session.open(&CaptureConstraints::default(), noop()).unwrap();
        session.open(&CaptureConstraints::default(), noop()).unwrap();

        assert_eq!(backend.open_calls(), 2);
        assert_eq!(backend.live_handles(), 1);
        assert_eq!(backend.max_live_handles(), 1);
        assert!(session.is_live());
    }

    #[test]
    fn close_is_idempotent() {
        let backend = MockBackend::with_default_devices();
        let session = CaptureSession::new(backend.clone());
        session.open(&CaptureConstraints::default(), noop()).unwrap();

        assert!(session.close());
        assert!(!session.close());
        assert_eq!(backend.live_handles(), 0);
        assert!(!session.is_live());
    }

    #[test]
    fn failed_open_leaves_nothing_open() {
        let backend = MockBackend::with_default_devices();
        let session = CaptureSession::new(backend.clone());
        session.open(&CaptureConstraints::default(), noop()).unwrap();

        backend.fail_next_open(CaptureOpenError::PermissionDenied);
        let err = session.open(&CaptureConstraints::default(), noop()).unwrap_err();
        assert_eq!(err, CaptureOpenError::PermissionDenied);
        assert_eq!(backend.live_handles(), 0);
        assert!(!session.is_live());
    }

    #[test]
    fn ended_capture_is_not_live() {
        let backend = MockBackend::with_default_devices();
        let session = CaptureSession::new(backend.clone());
        session.open(&CaptureConstraints::default(), noop()).unwrap();

        backend.end_capture();
        assert!(!session.is_live());
    }

    #[test]
    fn disabled_state_carries_over_to_next_open() {
        let backend = MockBackend::with_default_devices();
        let session = CaptureSession::new(backend.clone());
        session.set_enabled(false);
        session.open(&CaptureConstraints::default(), noop()).unwrap();

        assert!(!backend.capture_enabled());
        session.set_enabled(true);
        assert!(backend.capture_enabled());
    }
}
