//! Infrastructure layer - adapter implementations
//!
//! Concrete implementations of the application ports: microphone capture,
//! recognition services, language-model backends, OSC and config storage.

pub mod capture;
pub mod config;
pub mod generation;
pub mod publishing;
pub mod recognition;

pub use capture::CpalCapturer;
pub use config::XdgConfigStore;
pub use generation::{create_generator, GeneratorSettings};
pub use publishing::{create_publisher, NoOpPublisher, OscExternalSource, OscPublisher};
pub use recognition::{create_recognizer, AuddRecognizer, StreamingRecognizer};
