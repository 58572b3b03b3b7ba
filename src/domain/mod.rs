//! Domain layer - Core business logic
//!
//! Value objects, the cycle state machine and pure parsing.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod cycle;
pub mod error;
pub mod event;
pub mod generation;
pub mod schedule;
pub mod track;

pub use config::{AppConfig, GeneratorProvider, RecognizerProvider};
pub use cycle::{CycleSession, CycleState};
pub use error::*;
pub use event::{CycleStatus, EventValue, OutboundEvent};
pub use schedule::{Duration, ScheduleState};
pub use track::{AudioSnippet, Prompt, PromptSet, Track, TrackIdentity};
