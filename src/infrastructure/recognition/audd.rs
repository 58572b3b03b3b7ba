//! AudD HTTP upload recognizer

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::response::AuddResponse;
use super::PendingCalls;
use crate::application::ports::{RecognitionError, Recognizer};
use crate::domain::config::RecognizerProvider;
use crate::domain::track::{AudioSnippet, Track};
use crate::infrastructure::capture::encode_snippet;

pub const AUDD_API_URL: &str = "https://api.audd.io/";

/// Metadata sources requested alongside the match
const RETURN_SOURCES: &str = "apple_music,spotify";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads the snippet as FLAC and waits for a single JSON response
pub struct AuddRecognizer {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
    pending: PendingCalls,
}

impl AuddRecognizer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, AUDD_API_URL)
    }

    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            client,
            pending: PendingCalls::new(),
        }
    }

    fn form(&self, flac: Vec<u8>) -> Result<Form, RecognitionError> {
        let file = Part::bytes(flac)
            .file_name("snippet.flac")
            .mime_str("audio/flac")
            .map_err(|e| RecognitionError::NetworkError(e.to_string()))?;
        Ok(Form::new()
            .text("api_token", self.api_key.clone())
            .text("return", RETURN_SOURCES)
            .part("file", file))
    }

    async fn upload(&self, snippet: &AudioSnippet) -> Result<Option<Track>, RecognitionError> {
        let owned = snippet.clone();
        let flac = tokio::task::spawn_blocking(move || encode_snippet(&owned))
            .await
            .map_err(|e| RecognitionError::EncodingError(format!("Encoder task failed: {}", e)))?
            .map_err(|e| RecognitionError::EncodingError(e.to_string()))?;
        debug!(bytes = flac.len(), "Uploading snippet to AudD");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(self.form(flac)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::InvalidResponse(status.as_u16()));
        }

        let body = response.text().await?;
        AuddResponse::parse(&body)?.into_track()
    }
}

#[async_trait]
impl Recognizer for AuddRecognizer {
    fn provider(&self) -> RecognizerProvider {
        RecognizerProvider::Audd
    }

    fn credentials_valid(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn identify(
        &self,
        snippet: &AudioSnippet,
        cancel: &CancellationToken,
    ) -> Result<Option<Track>, RecognitionError> {
        if !self.credentials_valid() {
            return Err(RecognitionError::MissingCredentials);
        }

        let aborted = self.pending.begin();
        tokio::select! {
            _ = cancel.cancelled() => Err(RecognitionError::Cancelled),
            _ = aborted.cancelled() => Err(RecognitionError::Cancelled),
            result = self.upload(snippet) => result,
        }
    }

    fn cancel(&self) {
        self.pending.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::track::RECOGNITION_SAMPLE_RATE;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snippet() -> AudioSnippet {
        AudioSnippet::silence(Duration::from_secs(1), RECOGNITION_SAMPLE_RATE)
    }

    async fn server_replying(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn returns_matched_track() {
        let server = server_replying(ResponseTemplate::new(200).set_body_string(
            r#"{"status":"success","result":{"artist":"Burial","title":"Archangel"}}"#,
        ))
        .await;
        let recognizer = AuddRecognizer::with_endpoint("key", server.uri());

        let track = recognizer
            .identify(&snippet(), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(track.title, "Archangel");
        assert_eq!(track.artist, "Burial");
    }

    #[tokio::test]
    async fn null_result_is_no_match() {
        let server = server_replying(
            ResponseTemplate::new(200).set_body_string(r#"{"status":"success","result":null}"#),
        )
        .await;
        let recognizer = AuddRecognizer::with_endpoint("key", server.uri());

        let result = recognizer
            .identify(&snippet(), &CancellationToken::new())
            .await;
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn http_error_is_invalid_response() {
        let server = server_replying(ResponseTemplate::new(503)).await;
        let recognizer = AuddRecognizer::with_endpoint("key", server.uri());

        let result = recognizer
            .identify(&snippet(), &CancellationToken::new())
            .await;
        assert_eq!(result, Err(RecognitionError::InvalidResponse(503)));
    }

    #[tokio::test]
    async fn api_error_status() {
        let server = server_replying(ResponseTemplate::new(200).set_body_string(
            r#"{"status":"error","error":{"error_code":901,"error_message":"Limit reached"}}"#,
        ))
        .await;
        let recognizer = AuddRecognizer::with_endpoint("key", server.uri());

        let result = recognizer
            .identify(&snippet(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(RecognitionError::ApiError(m)) if m.contains("Limit reached")));
    }

    #[tokio::test]
    async fn empty_snippet_is_encoding_error_without_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let recognizer = AuddRecognizer::with_endpoint("key", server.uri());

        let result = recognizer
            .identify(
                &AudioSnippet::new(Vec::new(), RECOGNITION_SAMPLE_RATE),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(RecognitionError::EncodingError(_))));
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        let recognizer = AuddRecognizer::with_endpoint("  ", "http://127.0.0.1:9");
        let result = recognizer
            .identify(&snippet(), &CancellationToken::new())
            .await;
        assert_eq!(result, Err(RecognitionError::MissingCredentials));
    }

    #[tokio::test]
    async fn cancel_settles_pending_call() {
        let server = server_replying(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":"success","result":null}"#)
                .set_delay(Duration::from_secs(10)),
        )
        .await;
        let recognizer = Arc::new(AuddRecognizer::with_endpoint("key", server.uri()));

        let pending = {
            let recognizer = recognizer.clone();
            tokio::spawn(async move {
                recognizer
                    .identify(&snippet(), &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        recognizer.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(RecognitionError::Cancelled));
    }

    #[test]
    fn cancel_without_pending_call_is_harmless() {
        let recognizer = AuddRecognizer::new("key");
        recognizer.cancel();
        recognizer.cancel();
        assert!(recognizer.credentials_valid());
    }
}
