//! Configuration domain

mod app_config;
mod provider;

pub use app_config::{
    AppConfig, GenerationConfig, OscConfig, RecognitionConfig, DEFAULT_EXTERNAL_ADDRESS,
    DEFAULT_OSC_LISTEN_PORT, DEFAULT_OSC_PORT,
};
pub use provider::{GeneratorProvider, RecognizerProvider, ALL_GENERATORS, ALL_RECOGNIZERS};
