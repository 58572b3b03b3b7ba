//! External track event port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::track::Track;

#[derive(Debug, Clone, Error)]
pub enum ExternalSourceError {
    #[error("Failed to bind external event listener: {0}")]
    BindFailed(String),

    #[error("Failed to receive external event: {0}")]
    ReceiveFailed(String),
}

/// Port delivering tracks identified elsewhere (e.g. another instance).
#[async_trait]
pub trait ExternalEventSource: Send + Sync {
    /// Wait for the next well-formed external track.
    ///
    /// Malformed payloads are skipped internally. `Ok(None)` means the
    /// source is closed. Must be cancel-safe.
    async fn next_track(&self) -> Result<Option<Track>, ExternalSourceError>;
}
