//! Generated image prompts attached to a track

use serde::Serialize;

use super::track::Track;

/// Maximum number of prompts kept per track
pub const MAX_PROMPTS: usize = 10;

/// One generated prompt, tagged with its 1-based position and the track
/// parameters it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub number: u8,
    pub text: String,
    pub bpm: Option<f32>,
    pub energy: Option<f32>,
    pub danceability: Option<f32>,
}

impl Prompt {
    pub fn new(number: u8, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            bpm: None,
            energy: None,
            danceability: None,
        }
    }

    /// Create a prompt tagged with the numeric parameters of `track`
    pub fn for_track(number: u8, text: impl Into<String>, track: &Track) -> Self {
        Self {
            number,
            text: text.into(),
            bpm: track.bpm,
            energy: track.energy,
            danceability: track.danceability,
        }
    }
}

/// Ordered set of at most ten prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromptSet {
    prompts: Vec<Prompt>,
    diagnostic: bool,
}

impl PromptSet {
    /// Build a set, keeping at most [`MAX_PROMPTS`] entries in order
    pub fn new(mut prompts: Vec<Prompt>) -> Self {
        prompts.truncate(MAX_PROMPTS);
        Self {
            prompts,
            diagnostic: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A single placeholder prompt describing why generation failed
    pub fn diagnostic(track: &Track, message: impl Into<String>) -> Self {
        Self {
            prompts: vec![Prompt::for_track(1, message, track)],
            diagnostic: true,
        }
    }

    /// Whether this set is a failure placeholder rather than real output
    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Prompt at 1-based `position`
    pub fn get(&self, position: usize) -> Option<&Prompt> {
        position
            .checked_sub(1)
            .and_then(|index| self.prompts.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prompt> {
        self.prompts.iter()
    }
}
