//! Application configuration value object

use serde::{Deserialize, Serialize};

use super::provider::{GeneratorProvider, RecognizerProvider};
use crate::domain::generation::DEFAULT_INSTRUCTIONS;
use crate::domain::schedule::Duration;

/// Default OSC port the receiver listens on
pub const DEFAULT_OSC_PORT: u16 = 9000;
/// Default UDP port for inbound external-track announcements
pub const DEFAULT_OSC_LISTEN_PORT: u16 = 9001;
/// Default OSC address carrying external-track announcements
pub const DEFAULT_EXTERNAL_ADDRESS: &str = "/track/external";

/// Recognition provider section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub provider: Option<String>,
    pub api_key: Option<String>,
}

/// Prompt generation section. An unset provider disables generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub instructions: Option<String>,
}

/// OSC endpoint section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OscConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub listen_port: Option<u16>,
    pub external_address: Option<String>,
}

/// Application configuration.
/// All fields are optional to support partial configs and layered merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub interval: Option<String>,
    pub snippet_duration: Option<String>,
    pub recognition: Option<RecognitionConfig>,
    pub generation: Option<GenerationConfig>,
    pub osc: Option<OscConfig>,
}

impl AppConfig {
    /// Config with every defaultable value filled in
    pub fn defaults() -> Self {
        Self {
            interval: Some(Duration::default_interval().to_string()),
            snippet_duration: Some(Duration::default_snippet().to_string()),
            recognition: Some(RecognitionConfig {
                provider: Some(RecognizerProvider::default().to_string()),
                api_key: None,
            }),
            generation: None,
            osc: Some(OscConfig {
                host: None,
                port: Some(DEFAULT_OSC_PORT),
                listen_port: Some(DEFAULT_OSC_LISTEN_PORT),
                external_address: Some(DEFAULT_EXTERNAL_ADDRESS.to_string()),
            }),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge with `other`, whose set values take precedence
    pub fn merge(self, other: Self) -> Self {
        Self {
            interval: other.interval.or(self.interval),
            snippet_duration: other.snippet_duration.or(self.snippet_duration),
            recognition: merge_section(self.recognition, other.recognition, |b, o| {
                RecognitionConfig {
                    provider: o.provider.or(b.provider),
                    api_key: o.api_key.or(b.api_key),
                }
            }),
            generation: merge_section(self.generation, other.generation, |b, o| {
                GenerationConfig {
                    provider: o.provider.or(b.provider),
                    api_key: o.api_key.or(b.api_key),
                    model: o.model.or(b.model),
                    base_url: o.base_url.or(b.base_url),
                    instructions: o.instructions.or(b.instructions),
                }
            }),
            osc: merge_section(self.osc, other.osc, |b, o| OscConfig {
                host: o.host.or(b.host),
                port: o.port.or(b.port),
                listen_port: o.listen_port.or(b.listen_port),
                external_address: o.external_address.or(b.external_address),
            }),
        }
    }

    pub fn interval_or_default(&self) -> Duration {
        self.interval
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_interval)
    }

    pub fn snippet_duration_or_default(&self) -> Duration {
        self.snippet_duration
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_snippet)
    }

    pub fn recognizer_provider_or_default(&self) -> RecognizerProvider {
        self.recognition
            .as_ref()
            .and_then(|r| r.provider.as_ref())
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }

    pub fn recognition_api_key(&self) -> Option<&str> {
        self.recognition
            .as_ref()
            .and_then(|r| r.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }

    /// Selected generator, or `None` when generation is disabled or unknown
    pub fn generator_provider(&self) -> Option<GeneratorProvider> {
        self.generation
            .as_ref()
            .and_then(|g| g.provider.as_ref())
            .and_then(|p| p.parse().ok())
    }

    pub fn generation_api_key(&self) -> Option<&str> {
        self.generation
            .as_ref()
            .and_then(|g| g.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn generation_model(&self) -> Option<&str> {
        self.generation.as_ref().and_then(|g| g.model.as_deref())
    }

    pub fn generation_base_url(&self) -> Option<&str> {
        self.generation.as_ref().and_then(|g| g.base_url.as_deref())
    }

    pub fn generation_instructions_or_default(&self) -> &str {
        self.generation
            .as_ref()
            .and_then(|g| g.instructions.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_INSTRUCTIONS)
    }

    /// Receiver host; `None` means publishing is unconfigured
    pub fn osc_host(&self) -> Option<&str> {
        self.osc
            .as_ref()
            .and_then(|o| o.host.as_deref())
            .filter(|h| !h.trim().is_empty())
    }

    pub fn osc_port_or_default(&self) -> u16 {
        self.osc
            .as_ref()
            .and_then(|o| o.port)
            .unwrap_or(DEFAULT_OSC_PORT)
    }

    pub fn osc_listen_port_or_default(&self) -> u16 {
        self.osc
            .as_ref()
            .and_then(|o| o.listen_port)
            .unwrap_or(DEFAULT_OSC_LISTEN_PORT)
    }

    pub fn osc_external_address_or_default(&self) -> &str {
        self.osc
            .as_ref()
            .and_then(|o| o.external_address.as_deref())
            .unwrap_or(DEFAULT_EXTERNAL_ADDRESS)
    }
}

fn merge_section<T>(base: Option<T>, other: Option<T>, f: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, other) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (Some(b), Some(o)) => Some(f(b, o)),
    }
}
