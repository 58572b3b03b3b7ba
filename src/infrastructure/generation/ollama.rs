//! Local Ollama backend. Needs no credential.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{http_client, send, GeneratorSettings};
use crate::application::ports::{GenerationError, PromptGenerator};
use crate::domain::config::GeneratorProvider;
use crate::domain::generation::{parse_prompt_response, PromptRequest};
use crate::domain::track::{PromptSet, Track};

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

pub struct OllamaGenerator {
    settings: GeneratorSettings,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            client: http_client(),
        }
    }
}

#[async_trait]
impl PromptGenerator for OllamaGenerator {
    fn provider(&self) -> GeneratorProvider {
        GeneratorProvider::Ollama
    }

    fn is_configured(&self) -> bool {
        !self.settings.base_url.is_empty()
    }

    async fn generate(
        &self,
        track: &Track,
        cancel: &CancellationToken,
    ) -> Result<PromptSet, GenerationError> {
        let body = GenerateRequest {
            model: self.settings.model.clone(),
            prompt: PromptRequest::compose(track, &self.settings.instructions).into_content(),
            stream: false,
            format: "json",
        };
        let request = self
            .client
            .post(format!("{}/api/generate", self.settings.base_url))
            .json(&body);
        let raw = send(request, cancel).await?;

        let response: GenerateResponse = match serde_json::from_str(&raw) {
            Ok(response) => response,
            Err(_) => return Ok(parse_prompt_response(&raw, track)),
        };
        if let Some(error) = response.error {
            return Err(GenerationError::ApiError(error));
        }

        Ok(parse_prompt_response(
            response.response.as_deref().unwrap_or_default(),
            track,
        ))
    }
}
