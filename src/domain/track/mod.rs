//! Track domain

mod audio_snippet;
mod external;
mod prompt;
#[allow(clippy::module_inception)]
mod track;

pub use audio_snippet::{AudioSnippet, RECOGNITION_SAMPLE_RATE};
pub use external::parse_external_track;
pub use prompt::{Prompt, PromptSet, MAX_PROMPTS};
pub use track::{Level, Track, TrackIdentity};
