//! OpenAI chat completions backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{http_client, send, GeneratorSettings};
use crate::application::ports::{GenerationError, PromptGenerator};
use crate::domain::config::GeneratorProvider;
use crate::domain::generation::{parse_prompt_response, PromptRequest};
use crate::domain::track::{PromptSet, Track};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct OpenAiGenerator {
    settings: GeneratorSettings,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            client: http_client(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }

    fn build_request(&self, content: String) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: 0.9,
        }
    }

    fn extract_text(response: ChatResponse) -> Option<String> {
        response
            .choices?
            .into_iter()
            .next()?
            .message?
            .content
    }
}

#[async_trait]
impl PromptGenerator for OpenAiGenerator {
    fn provider(&self) -> GeneratorProvider {
        GeneratorProvider::OpenAi
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
            .bearer_auth(&self.settings.api_key)
            .json(&self.build_request(content));
        let raw = send(request, cancel).await?;

        let response: ChatResponse = match serde_json::from_str(&raw) {
            Ok(response) => response,
            Err(_) => return Ok(parse_prompt_response(&raw, track)),
        };
        if let Some(error) = response.error {
            return Err(GenerationError::ApiError(error.message));
        }

        let text = Self::extract_text(response).unwrap_or_default();
        Ok(parse_prompt_response(&text, track))
    }
}
