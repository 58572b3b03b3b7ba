//! Prompt generator adapters
//!
//! Every backend sends the same composed request text and funnels the
//! model's reply through `parse_prompt_response`.

mod anthropic;
mod gemini;
mod ollama;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use anthropic::AnthropicGenerator;
pub use gemini::GeminiGenerator;
pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

use crate::application::ports::{GenerationError, PromptGenerator};
use crate::domain::config::{AppConfig, GeneratorProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings resolved for one backend
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub instructions: String,
}

impl GeneratorSettings {
    /// Resolve settings for `provider`, falling back to its defaults
    pub fn resolve(provider: GeneratorProvider, config: &AppConfig) -> Self {
        Self {
            api_key: config.generation_api_key().unwrap_or_default().to_string(),
            model: config
                .generation_model()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(provider.default_model())
                .to_string(),
            base_url: config
                .generation_base_url()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(provider.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            instructions: config.generation_instructions_or_default().to_string(),
        }
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Create the configured generator, or `None` when generation is disabled
pub fn create_generator(config: &AppConfig) -> Option<Arc<dyn PromptGenerator>> {
    let provider = config.generator_provider()?;
    let settings = GeneratorSettings::resolve(provider, config);
    let generator: Arc<dyn PromptGenerator> = match provider {
        GeneratorProvider::OpenAi => Arc::new(OpenAiGenerator::new(settings)),
        GeneratorProvider::Anthropic => Arc::new(AnthropicGenerator::new(settings)),
        GeneratorProvider::Gemini => Arc::new(GeminiGenerator::new(settings)),
        GeneratorProvider::Ollama => Arc::new(OllamaGenerator::new(settings)),
    };
    Some(generator)
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Send `request`, returning the body of a 2xx reply
async fn send(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<String, GenerationError> {
    let exchange = async {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), %body, "Generator request rejected");
            return Err(GenerationError::InvalidResponse(status.as_u16()));
        }
        Ok(response.text().await?)
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        result = exchange => result,
    }
}
