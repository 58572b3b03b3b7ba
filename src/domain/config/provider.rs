//! Provider selection value objects
//!
//! Providers are chosen once from configuration by name; adapters are built
//! from the resulting tag, never by inspecting a concrete type.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::ParseProviderError;

/// Track recognition backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecognizerProvider {
    /// Upload a recorded file, wait for a single JSON response
    #[default]
    Audd,
    /// Continuous WebSocket session with a pushed result
    AuddStream,
}

pub const ALL_RECOGNIZERS: &[RecognizerProvider] =
    &[RecognizerProvider::Audd, RecognizerProvider::AuddStream];

impl RecognizerProvider {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audd => "audd",
            Self::AuddStream => "audd-stream",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Audd => "AudD (file upload)",
            Self::AuddStream => "AudD (streaming)",
        }
    }
}

impl FromStr for RecognizerProvider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audd" => Ok(Self::Audd),
            "audd-stream" | "audd_stream" => Ok(Self::AuddStream),
            _ => Err(ParseProviderError {
                role: "recognition",
                input: s.to_string(),
                valid: "audd, audd-stream",
            }),
        }
    }
}

impl fmt::Display for RecognizerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language-model backends used for prompt generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorProvider {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

pub const ALL_GENERATORS: &[GeneratorProvider] = &[
    GeneratorProvider::OpenAi,
    GeneratorProvider::Anthropic,
    GeneratorProvider::Gemini,
    GeneratorProvider::Ollama,
];

impl GeneratorProvider {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
            Self::Ollama => "Ollama (local)",
        }
    }

    /// Model used when none is configured
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::Gemini => "gemini-2.0-flash",
            Self::Ollama => "llama3.2",
        }
    }

    /// API root used when no base URL is configured
    pub const fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Whether the backend needs an API key to be usable
    pub const fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl FromStr for GeneratorProvider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ParseProviderError {
                role: "generation",
                input: s.to_string(),
                valid: "openai, anthropic, gemini, ollama",
            }),
        }
    }
}

impl fmt::Display for GeneratorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
