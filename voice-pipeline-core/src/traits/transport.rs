use crate::session::publisher::StreamHandle;

/// Real-time transport that sends the processed stream to peers.
pub trait Transport: Send + Sync {
    /// The outgoing stream was replaced by a structural rebuild; renegotiate or resend.
    fn on_local_stream_replaced(&self, stream: &StreamHandle);

    /// Suppress or resume playback of remote audio.
    fn set_remote_muted(&self, muted: bool);
}
