//! AudD result payload, shared by the upload and streaming recognizers

use serde::Deserialize;

use crate::application::ports::RecognitionError;
use crate::domain::track::Track;

/// Artwork size substituted into Apple Music URL templates
const ARTWORK_SIZE: &str = "600x600";

#[derive(Debug, Deserialize)]
pub(crate) struct AuddResponse {
    status: String,
    result: Option<AuddTrack>,
    error: Option<AuddError>,
}

#[derive(Debug, Deserialize)]
struct AuddError {
    error_code: Option<i64>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuddTrack {
    title: String,
    artist: String,
    album: Option<String>,
    release_date: Option<String>,
    apple_music: Option<AppleMusic>,
    spotify: Option<Spotify>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleMusic {
    #[serde(default)]
    genre_names: Vec<String>,
    artwork: Option<AppleArtwork>,
}

#[derive(Debug, Deserialize)]
struct AppleArtwork {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Spotify {
    album: Option<SpotifyAlbum>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

impl AuddResponse {
    pub(crate) fn parse(body: &str) -> Result<Self, RecognitionError> {
        serde_json::from_str(body).map_err(|e| RecognitionError::ParsingError(e.to_string()))
    }

    /// `Ok(None)` when the service found no match
    pub(crate) fn into_track(self) -> Result<Option<Track>, RecognitionError> {
        if self.status != "success" {
            let message = match self.error {
                Some(AuddError {
                    error_code: Some(code),
                    error_message: Some(message),
                }) => format!("#{}: {}", code, message),
                Some(AuddError {
                    error_message: Some(message),
                    ..
                }) => message,
                _ => format!("status {}", self.status),
            };
            return Err(RecognitionError::ApiError(message));
        }

        Ok(self.result.map(AuddTrack::into_track))
    }
}

impl AuddTrack {
    fn into_track(self) -> Track {
        let mut track = Track::new(self.title, self.artist);
        track.album = self.album.filter(|a| !a.is_empty());
        track.release_date = self.release_date.filter(|d| !d.is_empty());

        let apple_artwork = self.apple_music.as_ref().and_then(|apple| {
            apple
                .artwork
                .as_ref()
                .map(|art| art.url.replace("{w}x{h}", ARTWORK_SIZE))
        });
        let spotify_artwork = self
            .spotify
            .and_then(|s| s.album)
            .and_then(|album| album.images.into_iter().next())
            .map(|image| image.url);

        track.genre = self
            .apple_music
            .and_then(|apple| apple.genre_names.into_iter().find(|g| g != "Music"));
        track.artwork_url = apple_artwork.or(spotify_artwork);
        track
    }
}
