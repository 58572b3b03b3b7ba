//! Trackcast - ambient track identification broadcast over OSC
//!
//! Periodically captures a short audio snippet from the microphone, identifies
//! the playing track with a recognition service, asks a language model for
//! image-generation prompts describing it, and publishes everything to an
//! OSC receiver.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Tracks, prompts, durations, cycle state and errors
//! - **Application**: Use cases, the recognition orchestrator and port traits
//! - **Infrastructure**: Adapter implementations (cpal, AudD, LLM backends, OSC)
//! - **CLI**: Command-line interface, daemon control and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
