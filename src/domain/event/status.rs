//! Status values reported to the receiver

use std::fmt;

/// Value of the `status` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleStatus {
    Listening,
    Recognizing,
    Identified,
    NoMatch,
    Error,
    Stopped,
}

impl CycleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Listening => "listening",
            Self::Recognizing => "recognizing",
            Self::Identified => "identified",
            Self::NoMatch => "no_match",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
