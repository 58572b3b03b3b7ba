//! Typed key/value events sent to the receiver

use std::fmt;

use super::status::CycleStatus;
use crate::domain::track::{Track, MAX_PROMPTS};

/// Payload of an outbound event
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Text(String),
    Float(f32),
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "\"{}\"", s),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A single path/value pair, e.g. `track/title = "Song"`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    path: String,
    value: EventValue,
}

impl OutboundEvent {
    pub fn text(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: EventValue::Text(value.into()),
        }
    }

    pub fn float(path: impl Into<String>, value: f32) -> Self {
        Self {
            path: path.into(),
            value: EventValue::Float(value),
        }
    }

    pub fn status(status: CycleStatus) -> Self {
        Self::text("status", status.as_str())
    }

    pub fn manual(text: impl Into<String>) -> Self {
        Self::text("manual", text)
    }

    pub fn test_ping() -> Self {
        Self::text("test", "ping")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &EventValue {
        &self.value
    }

    /// Metadata events for `track`. Absent fields are sent empty (or 0.0)
    /// so the receiver never keeps values from the previous track.
    pub fn track_metadata(track: &Track) -> Vec<Self> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            Self::text("track/title", track.title.clone()),
            Self::text("track/artist", track.artist.clone()),
            Self::text("track/genre", text(&track.genre)),
            Self::float("track/bpm", track.bpm.unwrap_or(0.0)),
            Self::float("track/energy", track.energy.unwrap_or(0.0)),
            Self::float("track/danceability", track.danceability.unwrap_or(0.0)),
            Self::text("track/artwork", text(&track.artwork_url)),
        ]
    }

    /// One `track/promptN` event per prompt present on `track`
    pub fn track_prompts(track: &Track) -> Vec<Self> {
        track
            .prompts()
            .iter()
            .take(MAX_PROMPTS)
            .enumerate()
            .map(|(i, p)| Self::text(format!("track/prompt{}", i + 1), p.text.clone()))
            .collect()
    }
}

impl fmt::Display for OutboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.path, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::track::{Prompt, PromptSet};

    #[test]
    fn metadata_covers_every_field() {
        let mut track = Track::new("Song", "Artist");
        track.genre = Some("Techno".into());
        track.bpm = Some(128.0);
        track.artwork_url = Some("https://img/1.jpg".into());

        let events = OutboundEvent::track_metadata(&track);
        let paths: Vec<_> = events.iter().map(|e| e.path()).collect();
        assert_eq!(
            paths,
            [
                "track/title",
                "track/artist",
                "track/genre",
                "track/bpm",
                "track/energy",
                "track/danceability",
                "track/artwork"
            ]
        );
        assert_eq!(events[2].value(), &EventValue::Text("Techno".into()));
        assert_eq!(events[3].value(), &EventValue::Float(128.0));
        assert_eq!(events[4].value(), &EventValue::Float(0.0));
    }

    #[test]
    fn prompts_only_sent_when_present() {
        let track = Track::new("Song", "Artist");
        assert!(OutboundEvent::track_prompts(&track).is_empty());

        let track = track.with_prompts(PromptSet::new(vec![
            Prompt::new(1, "neon city"),
            Prompt::new(2, "foggy pier"),
        ]));
        let events = OutboundEvent::track_prompts(&track);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].path(), "track/prompt1");
        assert_eq!(events[1].to_string(), "track/prompt2 = \"foggy pier\"");
    }

    #[test]
    fn control_events() {
        assert_eq!(OutboundEvent::test_ping().to_string(), "test = \"ping\"");
        assert_eq!(OutboundEvent::manual("hello").path(), "manual");
        assert_eq!(
            OutboundEvent::status(CycleStatus::NoMatch).value(),
            &EventValue::Text("no_match".into())
        );
    }
}
