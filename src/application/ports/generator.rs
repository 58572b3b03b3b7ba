//! Prompt generation port

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::config::GeneratorProvider;
use crate::domain::track::{PromptSet, Track};

/// Generation transport errors.
///
/// Unparseable model output is not an error; it becomes a diagnostic prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unexpected HTTP status {0}")]
    InvalidResponse(u16),

    #[error("Language model API error: {0}")]
    ApiError(String),

    #[error("Generation timed out")]
    Timeout,

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("Missing generation API key")]
    MissingCredentials,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::InvalidResponse(status.as_u16())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

/// Port for generating image prompts for a track
#[async_trait]
pub trait PromptGenerator: Send + Sync {
    fn provider(&self) -> GeneratorProvider;

    /// Whether the backend has what it needs to be called
    fn is_configured(&self) -> bool;

    /// Generate up to ten prompts tagged with `track`'s parameters
    async fn generate(
        &self,
        track: &Track,
        cancel: &CancellationToken,
    ) -> Result<PromptSet, GenerationError>;
}
