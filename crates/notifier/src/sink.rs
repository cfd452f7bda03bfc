use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("rate limited by sink: {0}")]
    RateLimited(String),

    #[error("no destination configured")]
    NoDestination,
}

/// Outbound messaging endpoint.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver `text` to one destination. Implementations apply their own
    /// escaping and bounded retry.
    async fn send_message(&self, destination: i64, text: &str) -> Result<(), NotifyError>;

    /// Destination used by [`MessageSink::notify`].
    fn default_destination(&self) -> Option<i64> {
        None
    }

    /// Single-destination delivery to the default destination.
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let destination = self.default_destination().ok_or(NotifyError::NoDestination)?;
        self.send_message(destination, text).await
    }
}

/// Sink that only writes messages to the log, used when no bot token is set.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send_message(&self, destination: i64, text: &str) -> Result<(), NotifyError> {
        tracing::info!(destination, text, "Notification (log only)");
        Ok(())
    }
}
