//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capturer;
pub mod config;
pub mod external_source;
pub mod generator;
pub mod publisher;
pub mod recognizer;

pub use capturer::{CaptureError, SnippetCapturer};
pub use config::ConfigStore;
pub use external_source::{ExternalEventSource, ExternalSourceError};
pub use generator::{GenerationError, PromptGenerator};
pub use publisher::{NotificationPublisher, PublishError};
pub use recognizer::{RecognitionError, Recognizer};
