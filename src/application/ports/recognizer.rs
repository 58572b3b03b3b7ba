//! Track recognition port

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::config::RecognizerProvider;
use crate::domain::track::{AudioSnippet, Track};

/// Recognition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unexpected HTTP status {0}")]
    InvalidResponse(u16),

    #[error("Recognition API error: {0}")]
    ApiError(String),

    #[error("Failed to parse recognition response: {0}")]
    ParsingError(String),

    #[error("Could not encode snippet: {0}")]
    EncodingError(String),

    #[error("Recognition timed out")]
    Timeout,

    #[error("Recognition was cancelled")]
    Cancelled,

    #[error("Missing recognition API key")]
    MissingCredentials,
}

impl From<reqwest::Error> for RecognitionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::ParsingError(err.to_string())
        } else if let Some(status) = err.status() {
            Self::InvalidResponse(status.as_u16())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

/// Port for identifying the track playing in a snippet.
///
/// `identify` always settles: with a track, with `None` for no match, or
/// with an error. Pending calls settle with [`RecognitionError::Cancelled`]
/// once `cancel` fires or [`Recognizer::cancel`] is called.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn provider(&self) -> RecognizerProvider;

    /// Whether the configured credentials look usable
    fn credentials_valid(&self) -> bool;

    async fn identify(
        &self,
        snippet: &AudioSnippet,
        cancel: &CancellationToken,
    ) -> Result<Option<Track>, RecognitionError>;

    /// Abort any pending `identify`. Idempotent; a no-op when nothing is pending.
    fn cancel(&self);
}
