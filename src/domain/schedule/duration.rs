//! Duration value object for intervals and snippet lengths

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::error::DurationParseError;

/// Default snippet length (10 seconds)
pub const DEFAULT_SNIPPET_SECS: u64 = 10;

/// Default recognition cycle interval (5 minutes)
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// A positive, whole-second span of time.
///
/// Parsed from human strings such as `10s`, `5m`, `1h` or `2m30s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    secs: u64,
}

impl Duration {
    /// Create a Duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self { secs }
    }

    /// Create a Duration from whole minutes
    pub const fn from_mins(mins: u64) -> Self {
        Self::from_secs(mins * 60)
    }

    /// Default snippet length (10 seconds)
    pub const fn default_snippet() -> Self {
        Self::from_secs(DEFAULT_SNIPPET_SECS)
    }

    /// Default cycle interval (5 minutes)
    pub const fn default_interval() -> Self {
        Self::from_secs(DEFAULT_INTERVAL_SECS)
    }

    pub const fn as_secs(&self) -> u64 {
        self.secs
    }

    pub const fn as_millis(&self) -> u64 {
        self.secs * 1000
    }

    /// Convert to std::time::Duration
    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_secs(self.secs)
    }
}

impl From<Duration> for StdDuration {
    fn from(d: Duration) -> Self {
        d.as_std()
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DurationParseError {
            input: s.to_string(),
        };
        let input = s.trim().to_ascii_lowercase();
        if input.is_empty() {
            return Err(err());
        }

        let mut total: u64 = 0;
        let mut digits = String::new();
        // Units must appear in descending order, each at most once.
        let mut last_rank = u8::MAX;

        for ch in input.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }

            let (rank, factor) = match ch {
                'h' => (2, 3600),
                'm' => (1, 60),
                's' => (0, 1),
                _ => return Err(err()),
            };
            if digits.is_empty() || rank >= last_rank {
                return Err(err());
            }
            let value: u64 = digits.parse().map_err(|_| err())?;
            total = value
                .checked_mul(factor)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(err)?;
            digits.clear();
            last_rank = rank;
        }

        if !digits.is_empty() || total == 0 {
            return Err(err());
        }

        Ok(Self::from_secs(total))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.secs / 3600;
        let minutes = (self.secs % 3600) / 60;
        let seconds = self.secs % 60;

        let mut out = String::new();
        if hours > 0 {
            out.push_str(&format!("{}h", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}m", minutes));
        }
        if seconds > 0 || out.is_empty() {
            out.push_str(&format!("{}s", seconds));
        }
        f.write_str(&out)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::default_snippet()
    }
}
