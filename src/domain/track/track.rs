//! Track entity and its deduplication identity

use std::fmt;

use serde::Serialize;

use super::prompt::PromptSet;

/// Qualitative bucket for a 0-1 audio feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    Medium,
    High,
    NotAvailable,
}

impl Level {
    /// Bucket a 0-1 value: low < 0.33, medium < 0.66, high otherwise
    pub fn from_value(value: Option<f32>) -> Self {
        match value {
            None => Self::NotAvailable,
            Some(v) if v.is_nan() => Self::NotAvailable,
            Some(v) if v < 0.33 => Self::Low,
            Some(v) if v < 0.66 => Self::Medium,
            Some(_) => Self::High,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::NotAvailable => "N/A",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity used for deduplication: trimmed, case-preserving (title, artist).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    title: String,
    artist: String,
}

impl TrackIdentity {
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            artist: artist.trim().to_string(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" by {}", self.title, self.artist)
    }
}

/// An identified song.
///
/// Created fresh every cycle. Collaborators hand back new values; only the
/// orchestrator replaces the current track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub release_date: Option<String>,
    pub genre: Option<String>,
    /// Tempo in beats per minute
    pub bpm: Option<f32>,
    /// 0-1
    pub energy: Option<f32>,
    /// 0-1
    pub danceability: Option<f32>,
    pub artwork_url: Option<String>,
    prompts: PromptSet,
}

impl Track {
    /// Create a track with only title and artist known
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(&self.title, &self.artist)
    }

    /// Exact (case-sensitive) identity match after trimming
    pub fn is_same_track(&self, other: &Track) -> bool {
        self.identity() == other.identity()
    }

    pub fn energy_level(&self) -> Level {
        Level::from_value(self.energy)
    }

    pub fn danceability_level(&self) -> Level {
        Level::from_value(self.danceability)
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Return a copy of this track carrying `prompts`, replacing any previous set
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Return a copy of this track without prompts
    pub fn without_prompts(mut self) -> Self {
        self.prompts = PromptSet::empty();
        self
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}
