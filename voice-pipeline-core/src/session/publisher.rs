use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::device::CaptureFormat;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::transport::Transport;

use super::capture_session::CaptureSession;

/// Milliseconds of processed audio a stream buffers for the transport.
const STREAM_BUFFER_MILLIS: u32 = 1000;

struct StreamInner {
    id: Uuid,
    format: CaptureFormat,
    device_id: String,
    created_at: String,
    buffer: Mutex<RingBuffer>,
    latency_hint_ms: AtomicU32,
    ended: AtomicBool,
}

/// Reference to one processed output stream.
///
/// Cloning shares the stream. Two handles are equal iff they refer to the same
/// stream, so identity changes exactly when a new stream is published.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<StreamInner>,
}

impl StreamHandle {
    pub(crate) fn new(format: CaptureFormat, device_id: impl Into<String>, latency_hint_ms: u32) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: Uuid::new_v4(),
                format,
                device_id: device_id.into(),
                created_at: chrono::Utc::now().to_rfc3339(),
                buffer: Mutex::new(RingBuffer::for_duration(format, STREAM_BUFFER_MILLIS)),
                latency_hint_ms: AtomicU32::new(latency_hint_ms),
                ended: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn format(&self) -> CaptureFormat {
        self.inner.format
    }

    /// Capture device the stream originates from.
    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    /// RFC 3339 creation timestamp.
    pub fn created_at(&self) -> &str {
        &self.inner.created_at
    }

    pub fn latency_hint_ms(&self) -> u32 {
        self.inner.latency_hint_ms.load(Ordering::Relaxed)
    }

    /// No more samples will be written.
    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    /// Interleaved samples waiting to be read.
    pub fn available(&self) -> usize {
        self.inner.buffer.lock().count()
    }

    /// Drain up to `max_samples` processed interleaved samples.
    pub fn read(&self, max_samples: usize) -> Vec<f32> {
        self.inner.buffer.lock().read(max_samples)
    }

    /// Samples lost because the reader fell behind.
    pub fn dropped_samples(&self) -> u64 {
        self.inner.buffer.lock().dropped()
    }

    pub(crate) fn write(&self, samples: &[f32]) {
        if !self.is_ended() {
            self.inner.buffer.lock().write(samples);
        }
    }

    pub(crate) fn set_latency_hint(&self, millis: u32) {
        self.inner.latency_hint_ms.store(millis, Ordering::Relaxed);
    }

    pub(crate) fn end(&self) {
        if !self.inner.ended.swap(true, Ordering::SeqCst) {
            log::debug!("Output stream {} ended", self.inner.id);
        }
    }
}

impl PartialEq for StreamHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for StreamHandle {}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.inner.id)
            .field("format", &self.inner.format)
            .field("device_id", &self.inner.device_id)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// Listener fired with each newly published stream.
pub type StreamListener = Arc<dyn Fn(&StreamHandle) + Send + Sync + 'static>;

/// Exposes the current processed stream to the transport and owns mute state.
///
/// Capture and render mute are independent of the effect graph and of each other.
pub struct OutputPublisher {
    transport: Arc<dyn Transport>,
    current: Mutex<Option<StreamHandle>>,
    listeners: Mutex<Vec<StreamListener>>,
    capture_muted: AtomicBool,
    render_muted: AtomicBool,
}

impl OutputPublisher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            current: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            capture_muted: AtomicBool::new(false),
            render_muted: AtomicBool::new(false),
        }
    }

    /// Last published stream, if any.
    pub fn current(&self) -> Option<StreamHandle> {
        self.current.lock().clone()
    }

    pub fn on_changed(&self, listener: StreamListener) {
        self.listeners.lock().push(listener);
    }

    /// Make `stream` current, then tell the transport and every listener once.
    pub fn publish(&self, stream: StreamHandle) {
        *self.current.lock() = Some(stream.clone());
        log::info!("Published output stream {}", stream.id());

        self.transport.on_local_stream_replaced(&stream);
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(&stream);
        }
    }

    /// Returns `true` if the mute state changed.
    pub fn set_capture_muted(&self, session: &CaptureSession, muted: bool) -> bool {
        if self.capture_muted.swap(muted, Ordering::SeqCst) == muted {
            return false;
        }
        session.set_enabled(!muted);
        log::info!("Capture {}", if muted { "muted" } else { "unmuted" });
        true
    }

    /// Returns `true` if the mute state changed; only then is the transport told.
    pub fn set_render_muted(&self, muted: bool) -> bool {
        if self.render_muted.swap(muted, Ordering::SeqCst) == muted {
            return false;
        }
        self.transport.set_remote_muted(muted);
        log::info!("Render {}", if muted { "muted" } else { "unmuted" });
        true
    }

    pub fn is_capture_muted(&self) -> bool {
        self.capture_muted.load(Ordering::SeqCst)
    }

    pub fn is_render_muted(&self) -> bool {
        self.render_muted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBackend, RecordingTransport};

    const MONO: CaptureFormat = CaptureFormat {
        sample_rate: 48000,
        channels: 1,
    };

    #[test]
    fn stream_identity_is_shared_by_clones() {
        let a = StreamHandle::new(MONO, "mic-1", 20);
        let b = a.clone();
        let c = StreamHandle::new(MONO, "mic-1", 20);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn stream_buffers_until_ended() {
        let stream = StreamHandle::new(MONO, "mic-1", 20);
        stream.write(&[0.1, 0.2]);
        stream.end();
        stream.write(&[0.3]);
        assert!(stream.is_ended());
        assert_eq!(stream.read(16), vec![0.1, 0.2]);
    }

    #[test]
    fn publish_notifies_transport_and_listeners_once() {
        let transport = RecordingTransport::new();
        let publisher = OutputPublisher::new(transport.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        publisher.on_changed(Arc::new(move |s: &StreamHandle| sink.lock().push(s.id())));

        let stream = StreamHandle::new(MONO, "mic-1", 20);
        publisher.publish(stream.clone());

        assert_eq!(publisher.current(), Some(stream.clone()));
        assert_eq!(transport.replaced(), vec![stream.id()]);
        assert_eq!(*seen.lock(), vec![stream.id()]);
    }

    #[test]
    fn mutes_are_independent() {
        let transport = RecordingTransport::new();
        let publisher = OutputPublisher::new(transport.clone());
        let session = CaptureSession::new(MockBackend::with_default_devices());

        assert!(publisher.set_capture_muted(&session, true));
        assert!(!publisher.set_capture_muted(&session, true));
        assert!(!session.is_enabled());
        assert!(!publisher.is_render_muted());
        assert!(transport.remote_mutes().is_empty());

        assert!(publisher.set_render_muted(true));
        assert!(!publisher.set_render_muted(true));
        assert_eq!(transport.remote_mutes(), vec![true]);
        assert!(publisher.is_capture_muted());
    }
}
