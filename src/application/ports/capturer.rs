//! Snippet capture port

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::schedule::Duration;
use crate::domain::track::AudioSnippet;

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No audio input device available")]
    NoInputDevice,

    #[error("Failed to start capture: {0}")]
    StartFailed(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Capture was cancelled")]
    Cancelled,
}

/// Port for fixed-duration audio capture
#[async_trait]
pub trait SnippetCapturer: Send + Sync {
    /// Record a snippet of `duration`.
    ///
    /// Implementations must watch `cancel` while recording and return
    /// [`CaptureError::Cancelled`] promptly once it fires.
    async fn capture(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<AudioSnippet, CaptureError>;
}
