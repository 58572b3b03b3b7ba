//! Publisher used when no receiver is configured

use async_trait::async_trait;

use crate::application::ports::{NotificationPublisher, PublishError};
use crate::domain::event::OutboundEvent;

/// Drops every event and reports itself unconfigured
pub struct NoOpPublisher;

impl NoOpPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPublisher for NoOpPublisher {
    fn is_configured(&self) -> bool {
        false
    }

    fn endpoint(&self) -> Option<String> {
        None
    }

    async fn publish(&self, _event: &OutboundEvent) -> Result<(), PublishError> {
        Err(PublishError::Unconfigured)
    }
}
