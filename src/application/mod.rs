//! Application layer - Use cases and port interfaces
//!
//! Contains the recognition orchestrator, the one-shot identification use
//! case and trait definitions for external system interactions.

pub mod identify_once;
pub mod orchestrator;
pub mod ports;
pub mod scheduler;

pub use identify_once::{
    IdentifyCallbacks, IdentifyError, IdentifyInput, IdentifyOnceUseCase, IdentifyOutput,
};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, OrchestratorStatus, RecognitionOrchestrator,
};
