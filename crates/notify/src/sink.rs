use async_trait::async_trait;

use crate::SinkError;

/// Transport delivering a message to one channel identity.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel_id: &str, message: &str) -> Result<(), SinkError>;
}

/// Sink writing every alert to the log. Used when no chat transport is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, channel_id: &str, message: &str) -> Result<(), SinkError> {
        tracing::info!(target: "podscope::alerts", %channel_id, %message, "alert");
        Ok(())
    }
}
