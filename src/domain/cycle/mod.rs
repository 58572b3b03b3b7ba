//! Recognition cycle domain

mod state;

pub use state::{CycleSession, CycleState, InvalidStateTransition};
