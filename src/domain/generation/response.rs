//! Defensive parsing of language-model responses

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::track::{Prompt, PromptSet, Track, MAX_PROMPTS};

/// Characters of raw response quoted in a diagnostic prompt
const EXCERPT_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseParseError {
    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("response has no prompts")]
    NoPrompts,

    #[error("no prompt entry had a usable \"prompt\" field")]
    NoValidEntries,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    prompts: Option<Vec<Value>>,
}

/// Parse a raw model response into prompts tagged with `track`'s parameters.
///
/// Never fails: when nothing usable is found the result is a single
/// diagnostic prompt quoting the error and the start of the response.
pub fn parse_prompt_response(raw: &str, track: &Track) -> PromptSet {
    match try_parse_prompts(raw, track) {
        Ok(set) => set,
        Err(err) => {
            tracing::warn!(error = %err, "Prompt response unusable, substituting diagnostic");
            PromptSet::diagnostic(
                track,
                format!("Prompt generation failed: {}. Response: \"{}\"", err, excerpt(raw)),
            )
        }
    }
}

/// Strict variant of [`parse_prompt_response`]
pub fn try_parse_prompts(raw: &str, track: &Track) -> Result<PromptSet, ResponseParseError> {
    let json = extract_json_object(raw).ok_or(ResponseParseError::NoJsonObject)?;
    let parsed: RawResponse =
        serde_json::from_str(json).map_err(|e| ResponseParseError::InvalidJson(e.to_string()))?;

    let entries = parsed
        .prompts
        .filter(|p| !p.is_empty())
        .ok_or(ResponseParseError::NoPrompts)?;

    let prompts: Vec<Prompt> = entries
        .iter()
        .filter_map(prompt_text)
        .take(MAX_PROMPTS)
        .enumerate()
        .map(|(i, text)| Prompt::for_track((i + 1) as u8, text, track))
        .collect();

    if prompts.is_empty() {
        return Err(ResponseParseError::NoValidEntries);
    }
    Ok(PromptSet::new(prompts))
}

/// Substring from the first `{` to the last `}`
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn prompt_text(entry: &Value) -> Option<String> {
    let text = entry.get("prompt")?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    if trimmed.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        let mut track = Track::new("Song", "Artist");
        track.bpm = Some(120.0);
        track
    }

    #[test]
    fn extracts_json_from_surrounding_prose() {
        let raw = r#"Here are prompts: {"prompts":[{"prompt_number":1,"prompt":"A"}]} thanks"#;
        let set = parse_prompt_response(raw, &track());
        assert!(!set.is_diagnostic());
        assert_eq!(set.len(), 1);
        let prompt = set.get(1).unwrap();
        assert_eq!(prompt.text, "A");
        assert_eq!(prompt.number, 1);
        assert_eq!(prompt.bpm, Some(120.0));
    }

    #[test]
    fn non_json_yields_single_diagnostic() {
        let set = parse_prompt_response("I cannot help with that.", &track());
        assert!(set.is_diagnostic());
        assert_eq!(set.len(), 1);
        let text = &set.get(1).unwrap().text;
        assert!(text.contains("no JSON object"));
        assert!(text.contains("I cannot help with that."));
    }

    #[test]
    fn broken_json_reports_decode_error() {
        let set = parse_prompt_response(r#"{"prompts": [ {"prompt": "A"} "#, &track());
        assert!(set.is_diagnostic());
        // last '}' closes the entry, so the decoder sees truncated JSON
        assert!(set.get(1).unwrap().text.contains("invalid JSON"));
    }

    #[test]
    fn empty_prompt_array_is_fallback() {
        let err = try_parse_prompts(r#"{"prompts":[]}"#, &track()).unwrap_err();
        assert_eq!(err, ResponseParseError::NoPrompts);
        let err = try_parse_prompts(r#"{"other":1}"#, &track()).unwrap_err();
        assert_eq!(err, ResponseParseError::NoPrompts);
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let raw = r#"{"prompts":[{"prompt":""},{"prompt_number":2},{"prompt":"B"},"junk",{"prompt":"C"}]}"#;
        let set = try_parse_prompts(raw, &track()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).unwrap().text, "B");
        assert_eq!(set.get(1).unwrap().number, 1);
        assert_eq!(set.get(2).unwrap().text, "C");
    }

    #[test]
    fn all_invalid_entries_is_fallback() {
        let err = try_parse_prompts(r#"{"prompts":[{"prompt":1},{}]}"#, &track()).unwrap_err();
        assert_eq!(err, ResponseParseError::NoValidEntries);
    }

    #[test]
    fn keeps_at_most_ten() {
        let entries: Vec<String> = (1..=14)
            .map(|n| format!(r#"{{"prompt_number":{n},"prompt":"p{n}"}}"#))
            .collect();
        let raw = format!(r#"{{"prompts":[{}]}}"#, entries.join(","));
        let set = try_parse_prompts(&raw, &track()).unwrap();
        assert_eq!(set.len(), 10);
        assert_eq!(set.get(10).unwrap().text, "p10");
    }

    #[test]
    fn excerpt_is_truncated() {
        let raw = "x".repeat(500);
        let set = parse_prompt_response(&raw, &track());
        let text = &set.get(1).unwrap().text;
        assert!(text.ends_with("...\""));
        assert!(text.len() < 300);
    }
}
