//! Payload format for externally identified tracks
//!
//! Other instances announce a track as `song:<TITLE> from:<ARTIST>`.

use super::track::Track;

const SONG_TAG: &str = "song:";
const ARTIST_TAG: &str = "from:";

/// Parse an external announcement. Returns `None` for malformed payloads
/// (no `from:` separator, or an empty title or artist).
pub fn parse_external_track(payload: &str) -> Option<Track> {
    let payload = payload.trim();
    let split_at = payload.rfind(ARTIST_TAG)?;

    let head = &payload[..split_at];
    let artist = payload[split_at + ARTIST_TAG.len()..].trim();
    let title = head.trim().strip_prefix(SONG_TAG).unwrap_or(head).trim();

    if title.is_empty() || artist.is_empty() {
        return None;
    }

    Some(Track::new(title, artist))
}
