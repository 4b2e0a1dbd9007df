//! Notification sink trait definition.

use async_trait::async_trait;

use crate::error::NotifyError;

/// Capability that delivers one `(title, body)` pair to one destination URI.
///
/// The URI passed in is already decorated for this call (see
/// [`super::Destination::decorated_uri`]); implementations resolve it on
/// every delivery and keep no per-destination state.
///
/// # Example
///
/// ```ignore
/// use postwatch::notify::NotificationSink;
///
/// struct StdoutSink;
///
/// #[async_trait]
/// impl NotificationSink for StdoutSink {
///     async fn deliver(&self, destination: &str, title: &str, body: &str) -> Result<(), NotifyError> {
///         println!("{destination}: {title} - {body}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification.
    ///
    /// * `Ok(())` - accepted by the destination
    /// * `Err(NotifyError)` - rejected, or failed after the sink's own retries
    async fn deliver(&self, destination: &str, title: &str, body: &str)
    -> Result<(), NotifyError>;
}
