//! Notification publishing port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::event::OutboundEvent;

#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Publisher endpoint is not configured")]
    Unconfigured,

    #[error("Failed to encode event {path}: {message}")]
    EncodeFailed { path: String, message: String },

    #[error("Failed to send event: {0}")]
    SendFailed(String),
}

/// Port for sending typed key/value events to the receiver
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Whether an endpoint is configured
    fn is_configured(&self) -> bool;

    /// Human-readable endpoint, if configured
    fn endpoint(&self) -> Option<String>;

    async fn publish(&self, event: &OutboundEvent) -> Result<(), PublishError>;

    /// Send events in order, stopping at the first failure
    async fn publish_all(&self, events: &[OutboundEvent]) -> Result<(), PublishError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}
