/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Destination for user-facing messages (toasts, banners).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}
