//! One-shot identification use case

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::error::ConfigError;
use crate::domain::event::OutboundEvent;
use crate::domain::schedule::Duration;
use crate::domain::track::{PromptSet, Track};

use super::ports::{
    CaptureError, GenerationError, NotificationPublisher, PromptGenerator, RecognitionError,
    Recognizer, SnippetCapturer,
};

/// Errors from the one-shot use case
#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recognition failed: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Cancelled")]
    Cancelled,
}

/// Input parameters for a single identification
#[derive(Debug, Clone)]
pub struct IdentifyInput {
    pub snippet_duration: Duration,
    /// Whether to send the result to the configured receiver
    pub publish: bool,
}

impl Default for IdentifyInput {
    fn default() -> Self {
        Self {
            snippet_duration: Duration::default_snippet(),
            publish: true,
        }
    }
}

/// Output from a single identification
#[derive(Debug, Clone)]
pub struct IdentifyOutput {
    /// The identified track with prompts, or `None` for no match
    pub track: Option<Track>,
    /// Whether events reached the receiver
    pub published: bool,
    /// Captured audio size in human-readable format
    pub snippet_size: String,
}

/// Callbacks for progress reporting
#[derive(Default)]
#[allow(clippy::type_complexity)]
pub struct IdentifyCallbacks {
    pub on_capture_start: Option<Box<dyn Fn(Duration) + Send + Sync>>,
    /// Called with the human-readable snippet size
    pub on_capture_end: Option<Box<dyn Fn(&str) + Send + Sync>>,
    pub on_identify_start: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_generate_start: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Capture, identify, generate and publish exactly once
pub struct IdentifyOnceUseCase {
    capturer: Arc<dyn SnippetCapturer>,
    recognizer: Arc<dyn Recognizer>,
    generator: Option<Arc<dyn PromptGenerator>>,
    publisher: Arc<dyn NotificationPublisher>,
    cancel: CancellationToken,
}

impl IdentifyOnceUseCase {
    pub fn new(
        capturer: Arc<dyn SnippetCapturer>,
        recognizer: Arc<dyn Recognizer>,
        generator: Option<Arc<dyn PromptGenerator>>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            capturer,
            recognizer,
            generator,
            publisher,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts the run when cancelled (e.g. on Ctrl+C)
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn execute(
        &self,
        input: IdentifyInput,
        callbacks: IdentifyCallbacks,
    ) -> Result<IdentifyOutput, IdentifyError> {
        if !self.recognizer.credentials_valid() {
            let provider = self.recognizer.provider();
            return Err(ConfigError::InvalidCredentials(provider.label().to_string()).into());
        }

        if let Some(ref cb) = callbacks.on_capture_start {
            cb(input.snippet_duration);
        }
        let snippet = self
            .capturer
            .capture(input.snippet_duration, &self.cancel)
            .await?;
        let snippet_size = snippet.human_readable_size();
        if let Some(ref cb) = callbacks.on_capture_end {
            cb(&snippet_size);
        }

        if let Some(ref cb) = callbacks.on_identify_start {
            cb();
        }
        let Some(track) = self.recognizer.identify(&snippet, &self.cancel).await? else {
            return Ok(IdentifyOutput {
                track: None,
                published: false,
                snippet_size,
            });
        };

        let publish = input.publish && self.publisher.is_configured();
        let mut published = publish && self.send(&OutboundEvent::track_metadata(&track)).await;

        let track = match self.generator.as_ref().filter(|g| g.is_configured()) {
            Some(generator) => {
                if let Some(ref cb) = callbacks.on_generate_start {
                    cb();
                }
                let prompts = match generator.generate(&track, &self.cancel).await {
                    Ok(prompts) => prompts,
                    Err(GenerationError::Cancelled) => return Err(IdentifyError::Cancelled),
                    Err(_) if self.cancel.is_cancelled() => return Err(IdentifyError::Cancelled),
                    Err(e) => {
                        warn!(error = %e, "Prompt generation failed");
                        PromptSet::diagnostic(&track, format!("Prompt generation failed: {}", e))
                    }
                };
                let enriched = track.with_prompts(prompts);
                if publish {
                    let mut events = OutboundEvent::track_metadata(&enriched);
                    events.extend(OutboundEvent::track_prompts(&enriched));
                    published = self.send(&events).await && published;
                }
                enriched
            }
            None => track,
        };

        Ok(IdentifyOutput {
            track: Some(track),
            published,
            snippet_size,
        })
    }

    async fn send(&self, events: &[OutboundEvent]) -> bool {
        match self.publisher.publish_all(events).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to publish track");
                false
            }
        }
    }
}
