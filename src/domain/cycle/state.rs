//! Recognition cycle state machine

use std::fmt;

use thiserror::Error;

use crate::domain::event::CycleStatus;

/// States of the recognition pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Listening,
    Capturing,
    Identifying,
    NoMatch,
    GeneratingPrompts,
    Publishing,
    Error,
    Cancelled,
}

impl CycleState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Capturing => "capturing",
            Self::Identifying => "identifying",
            Self::NoMatch => "no_match",
            Self::GeneratingPrompts => "generating_prompts",
            Self::Publishing => "publishing",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// States that belong to a running cycle
    pub const fn is_in_cycle(&self) -> bool {
        matches!(
            self,
            Self::Capturing | Self::Identifying | Self::GeneratingPrompts | Self::Publishing
        )
    }

    /// Status reported to the receiver while in this state
    pub const fn status(&self) -> CycleStatus {
        match self {
            Self::Listening | Self::Capturing => CycleStatus::Listening,
            Self::Identifying => CycleStatus::Recognizing,
            Self::GeneratingPrompts | Self::Publishing => CycleStatus::Identified,
            Self::NoMatch => CycleStatus::NoMatch,
            Self::Error => CycleStatus::Error,
            Self::Idle | Self::Cancelled => CycleStatus::Stopped,
        }
    }

    fn can_transition_to(&self, next: CycleState) -> bool {
        use CycleState::*;
        match (self, next) {
            (Idle, Listening) => true,
            (Cancelled, Idle) => true,
            // Anything running can be cancelled
            (Idle | Cancelled, Cancelled) => false,
            (_, Cancelled) => true,
            (Listening, Capturing | Publishing) => true,
            (Capturing, Identifying | Error | Listening) => true,
            (Identifying, NoMatch | Publishing | Error | Listening) => true,
            (Publishing, GeneratingPrompts | Listening) => true,
            (GeneratingPrompts, Publishing | Listening) => true,
            (NoMatch | Error, Listening) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid cycle transition: {from} -> {to}")]
pub struct InvalidStateTransition {
    pub from: CycleState,
    pub to: CycleState,
}

/// Cycle state holder.
///
/// State machine:
///   IDLE -> LISTENING (start)
///   LISTENING -> CAPTURING -> IDENTIFYING -> PUBLISHING -> GENERATING_PROMPTS -> PUBLISHING -> LISTENING
///   LISTENING -> PUBLISHING (injected external track)
///   IDENTIFYING -> NO_MATCH -> LISTENING
///   CAPTURING | IDENTIFYING -> ERROR -> LISTENING
///   any in-cycle state -> LISTENING (pre-emption)
///   any running state -> CANCELLED -> IDLE (stop)
#[derive(Debug, Default)]
pub struct CycleSession {
    state: CycleState,
}

impl CycleSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CycleState::Idle
    }

    /// Move to `next`, rejecting transitions the machine does not allow
    pub fn transition_to(&mut self, next: CycleState) -> Result<(), InvalidStateTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidStateTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
