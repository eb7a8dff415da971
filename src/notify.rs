//! User-visible notifications.
//!
//! The engine never fails the host page; anything the user must see
//! synchronously (missing credentials, a failed reorder) goes through this
//! boundary. Browser hosts map it to a blocking alert; headless hosts log.

/// Synchronous, user-facing notification sink.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Default sink: surfaces alerts through the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!(%message, "user notification");
    }
}
