//! Composed request text for prompt generation

use crate::domain::track::{Track, MAX_PROMPTS};

/// Instruction block used when the user has not customised one
pub const DEFAULT_INSTRUCTIONS: &str = "Write vivid, self-contained image prompts for a live visual show. \
Each prompt should describe a single scene: subject, setting, lighting, colour palette and camera style. \
Let the tempo drive the sense of motion and let energy and danceability drive intensity. \
Avoid text, logos and real people's likenesses.";

const OUTPUT_FORMAT: &str = r#"Output format:
Respond with ONLY a JSON object, no markdown fences and no text before or after it:
{"prompts":[{"track":"<title>","artist":"<artist>","prompt_number":1,"prompt":"<prompt text>"}]}"#;

/// The single request text sent to a language model.
///
/// Built from three segments: a role preamble describing the track, the
/// user's instruction block, and the strict JSON output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    content: String,
}

impl PromptRequest {
    pub fn compose(track: &Track, instructions: &str) -> Self {
        let preamble = preamble(track);
        let instructions = if instructions.trim().is_empty() {
            DEFAULT_INSTRUCTIONS
        } else {
            instructions.trim()
        };
        let content = format!("{}\n\nInstructions:\n{}\n\n{}", preamble, instructions, OUTPUT_FORMAT);
        Self { content }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

fn preamble(track: &Track) -> String {
    let genre = track.genre.as_deref().unwrap_or("N/A");
    let bpm = track
        .bpm
        .map(|b| format!("{:.0}", b))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "You are a creative director generating AI image prompts that visualise music.\n\
         Generate {max} image prompts for the track \"{title}\" by {artist}.\n\
         Genre: {genre}\n\
         Tempo: {bpm} BPM\n\
         Energy: {energy}\n\
         Danceability: {dance}",
        max = MAX_PROMPTS,
        title = track.title,
        artist = track.artist,
        genre = genre,
        bpm = bpm,
        energy = track.energy_level(),
        dance = track.danceability_level(),
    )
}
