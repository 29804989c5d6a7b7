//! # voice-pipeline-wasapi
//!
//! Windows WASAPI backend for voice-pipeline.
//!
//! Provides:
//! - `WasapiBackend`: the `CaptureBackend` implementation
//! - `WasapiMicCapture`: shared-mode microphone capture on a dedicated thread
//! - `DeviceEnumerator`: endpoint enumeration via the MMDevice API
//!
//! The crate is empty on other platforms.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use voice_pipeline_core::PipelineController;
//! use voice_pipeline_wasapi::WasapiBackend;
//!
//! let controller = PipelineController::new(Arc::new(WasapiBackend::new()), notifier, transport);
//! controller.start();
//! ```

#[cfg(target_os = "windows")]
mod backend;
#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;

#[cfg(target_os = "windows")]
pub use backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_mic::WasapiMicCapture;
