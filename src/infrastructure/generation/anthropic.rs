//! Anthropic messages API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{http_client, send, GeneratorSettings};
use crate::application::ports::{GenerationError, PromptGenerator};
use crate::domain::config::GeneratorProvider;
use crate::domain::generation::{parse_prompt_response, PromptRequest};
use crate::domain::track::{PromptSet, Track};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct AnthropicGenerator {
    settings: GeneratorSettings,
    client: reqwest::Client,
}

impl AnthropicGenerator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            client: http_client(),
        }
    }

    fn build_request(&self, content: String) -> MessagesRequest {
        MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content,
            }],
        }
    }

    /// Concatenate the text blocks of a reply
    fn extract_text(response: &MessagesResponse) -> String {
        response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}

#[async_trait]
impl PromptGenerator for AnthropicGenerator {
    fn provider(&self) -> GeneratorProvider {
        GeneratorProvider::Anthropic
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
            .post(format!("{}/messages", self.settings.base_url))
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_request(content));
        let raw = send(request, cancel).await?;

        let response: MessagesResponse = match serde_json::from_str(&raw) {
            Ok(response) => response,
            Err(_) => return Ok(parse_prompt_response(&raw, track)),
        };
        if let Some(error) = response.error {
            return Err(GenerationError::ApiError(error.message));
        }

        Ok(parse_prompt_response(&Self::extract_text(&response), track))
    }
}
