//! Gemini generateContent backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{http_client, send, GeneratorSettings};
use crate::application::ports::{GenerationError, PromptGenerator};
use crate::domain::config::GeneratorProvider;
use crate::domain::generation::{parse_prompt_response, PromptRequest};
use crate::domain::track::{PromptSet, Track};

// Request types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

// Response types

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct GeminiGenerator {
    settings: GeneratorSettings,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            client: http_client(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.settings.base_url, self.settings.model, self.settings.api_key
        )
    }

    fn build_request(content: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: content }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.9,
            },
        }
    }

    /// Join the text parts of the first candidate
    fn extract_text(response: &GenerateContentResponse) -> Option<String> {
        let parts: Vec<&str> = response
            .candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }
}

#[async_trait]
impl PromptGenerator for GeminiGenerator {
    fn provider(&self) -> GeneratorProvider {
        GeneratorProvider::Gemini
    }

    fn is_configured(&self) -> bool {
        self.settings.has_key()
    }

    async fn generate(
        &self,
        track: &Track,
        cancel: &CancellationToken,
    ) -> Result<PromptSet, GenerationError> {
        if !self.is_configured() {
            return Err(GenerationError::MissingCredentials);
        }

        let content = PromptRequest::compose(track, &self.settings.instructions).into_content();
        let request = self
            .client
            .post(self.api_url())
            .json(&Self::build_request(content));
        let raw = send(request, cancel).await?;

        let response: GenerateContentResponse = match serde_json::from_str(&raw) {
            Ok(response) => response,
            Err(_) => return Ok(parse_prompt_response(&raw, track)),
        };
        if let Some(error) = response.error {
            return Err(GenerationError::ApiError(error.message));
        }

        let text = Self::extract_text(&response).unwrap_or_default();
        Ok(parse_prompt_response(&text, track))
    }
}
