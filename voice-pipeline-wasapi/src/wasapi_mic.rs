//! WASAPI microphone capture.
//!
//! Opens a capture endpoint in shared mode on a dedicated thread and delivers
//! f32 samples via the `AudioBufferCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use windows::core::{Error as WinError, Interface, HSTRING};
use windows::Win32::Foundation::{E_ACCESSDENIED, E_NOTFOUND};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::AvSetMmThreadCharacteristicsW;

use voice_pipeline_core::models::constraints::CaptureConstraints;
use voice_pipeline_core::models::device::CaptureFormat;
use voice_pipeline_core::models::error::CaptureOpenError;
use voice_pipeline_core::traits::capture_backend::{AudioBufferCallback, LiveCapture};

use crate::com::{take_co_string, ComGuard};

/// Shared-mode buffer duration in 100 ns units (100 ms).
const BUFFER_DURATION: i64 = 1_000_000;

struct Flags {
    running: AtomicBool,
    enabled: AtomicBool,
    ended: AtomicBool,
}

/// An open WASAPI microphone capture.
///
/// All COM objects live on the capture thread; this handle only carries flags.
pub struct WasapiMicCapture {
    device_id: String,
    format: CaptureFormat,
    flags: Arc<Flags>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WasapiMicCapture {
    /// Start capturing under `constraints`. Blocks until the device is running
    /// or the open failed.
    pub fn open(constraints: &CaptureConstraints, callback: AudioBufferCallback) -> Result<Self, CaptureOpenError> {
        let flags = Arc::new(Flags {
            running: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
            ended: AtomicBool::new(false),
        });
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let device_id = constraints.device_id.clone();
        let communications = constraints.wants_voice_processing();

        let thread_flags = Arc::clone(&flags);
        let handle = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || {
                if let Err(e) = capture_thread(device_id, communications, &thread_flags, callback, ready_tx) {
                    log::error!("Mic capture error: {}", e);
                }
                thread_flags.ended.store(true, Ordering::SeqCst);
            })
            .map_err(|e| CaptureOpenError::Unknown(format!("failed to spawn mic thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok((device_id, format))) => Ok(Self {
                device_id,
                format,
                flags,
                thread: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureOpenError::Unknown("capture thread exited during open".into()))
            }
        }
    }
}

impl LiveCapture for WasapiMicCapture {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn is_ended(&self) -> bool {
        self.flags.ended.load(Ordering::SeqCst)
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.flags.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.flags.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WasapiMicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

type Ready = mpsc::SyncSender<Result<(String, CaptureFormat), CaptureOpenError>>;

fn open_error(e: &WinError, device: &str) -> CaptureOpenError {
    let code = e.code();
    if code == E_ACCESSDENIED {
        CaptureOpenError::PermissionDenied
    } else if code == E_NOTFOUND || code == AUDCLNT_E_DEVICE_INVALIDATED {
        CaptureOpenError::DeviceNotFound(device.to_string())
    } else if code == AUDCLNT_E_DEVICE_IN_USE || code == AUDCLNT_E_EXCLUSIVE_MODE_NOT_ALLOWED {
        CaptureOpenError::DeviceBusy(device.to_string())
    } else {
        CaptureOpenError::Unknown(format!("{}: {}", device, e))
    }
}

/// Capture thread body.
///
/// Sequence:
/// 1. Join the MTA
/// 2. Resolve the endpoint (by id, or the default for the role)
/// 3. Activate IAudioClient, tag it as communications when voice processing is
///    requested, and initialize it in shared mode with the mix format
/// 4. Report the open result to `open()`
/// 5. Register with MMCSS and poll for packets until stopped or invalidated
fn capture_thread(
    device_id: Option<String>,
    communications: bool,
    flags: &Flags,
    callback: AudioBufferCallback,
    ready: Ready,
) -> Result<(), String> {
    let _com = ComGuard::enter();
    let label = device_id.clone().unwrap_or_else(|| "default microphone".into());

    let opened = unsafe { open_client(device_id.as_deref(), communications) };
    let (audio_client, capture_client, format, is_float, resolved_id) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(open_error(&e, &label)));
            return Ok(());
        }
    };

    unsafe {
        if let Err(e) = audio_client.Start() {
            let _ = ready.send(Err(open_error(&e, &label)));
            return Ok(());
        }
    }
    let _ = ready.send(Ok((resolved_id, format)));

    let mut task_index: u32 = 0;
    let _mmcss = unsafe { AvSetMmThreadCharacteristicsW(&HSTRING::from("Pro Audio"), &mut task_index) };

    let channels = format.channels as usize;
    let sample_rate = format.sample_rate as f64;
    let mut scratch: Vec<f32> = Vec::new();

    let result = (|| -> Result<(), WinError> {
        while flags.running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(10));

            let mut packet_length = unsafe { capture_client.GetNextPacketSize()? };
            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut buffer_flags: u32 = 0;
                unsafe {
                    capture_client.GetBuffer(&mut buffer_ptr, &mut num_frames, &mut buffer_flags, None, None)?;
                }

                let total = num_frames as usize * channels;
                scratch.clear();
                let silent = buffer_flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
                if silent || !flags.enabled.load(Ordering::SeqCst) || buffer_ptr.is_null() {
                    scratch.resize(total, 0.0);
                } else if is_float {
                    let samples = unsafe { std::slice::from_raw_parts(buffer_ptr as *const f32, total) };
                    scratch.extend_from_slice(samples);
                } else {
                    let samples = unsafe { std::slice::from_raw_parts(buffer_ptr as *const i16, total) };
                    scratch.extend(samples.iter().map(|s| *s as f32 / 32768.0));
                }

                unsafe {
                    capture_client.ReleaseBuffer(num_frames)?;
                }
                if total > 0 {
                    callback(&scratch, sample_rate, format.channels);
                }
                packet_length = unsafe { capture_client.GetNextPacketSize()? };
            }
        }
        Ok(())
    })();

    unsafe {
        let _ = audio_client.Stop();
    }
    match result {
        Err(e) if e.code() == AUDCLNT_E_DEVICE_INVALIDATED => {
            log::warn!("Capture device {} was removed", label);
            Ok(())
        }
        Err(e) => Err(format!("capture loop failed: {}", e)),
        Ok(()) => Ok(()),
    }
}

unsafe fn open_client(
    device_id: Option<&str>,
    communications: bool,
) -> Result<(IAudioClient, IAudioCaptureClient, CaptureFormat, bool, String), WinError> {
    let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)?;
    let device = match device_id {
        Some(id) => enumerator.GetDevice(&HSTRING::from(id))?,
        None => enumerator.GetDefaultAudioEndpoint(eCapture, if communications { eCommunications } else { eConsole })?,
    };
    let resolved_id = take_co_string(device.GetId()?).unwrap_or_default();

    let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None)?;
    if communications {
        // Lets the endpoint's communications processing (AEC, NS, AGC) run on
        // explicitly selected devices too. Must precede Initialize.
        if let Err(e) = set_stream_category(&audio_client, AudioCategory_Communications) {
            log::warn!("Could not tag capture stream as communications: {}", e);
        }
    }
    let mix_format_ptr = audio_client.GetMixFormat()?;
    let mix_format = &*mix_format_ptr;
    let format = CaptureFormat::new(mix_format.nSamplesPerSec, mix_format.nChannels);
    // 32-bit shared mix formats are float; 16-bit is PCM.
    let is_float = match mix_format.wBitsPerSample {
        32 => true,
        16 => false,
        _ => {
            CoTaskMemFree(Some(mix_format_ptr as *const _));
            return Err(WinError::from(AUDCLNT_E_UNSUPPORTED_FORMAT));
        }
    };

    let initialized = audio_client.Initialize(
        AUDCLNT_SHAREMODE_SHARED,
        AUDCLNT_STREAMFLAGS_NOPERSIST,
        BUFFER_DURATION,
        0,
        mix_format_ptr,
        None,
    );
    CoTaskMemFree(Some(mix_format_ptr as *const _));
    initialized?;

    let capture_client: IAudioCaptureClient = audio_client.GetService()?;
    Ok((audio_client, capture_client, format, is_float, resolved_id))
}

unsafe fn set_stream_category(audio_client: &IAudioClient, category: AUDIO_STREAM_CATEGORY) -> Result<(), WinError> {
    let client: IAudioClient2 = audio_client.cast()?;
    let properties = AudioClientProperties {
        cbSize: std::mem::size_of::<AudioClientProperties>() as u32,
        eCategory: category,
        ..Default::default()
    };
    client.SetClientProperties(&properties)
}
