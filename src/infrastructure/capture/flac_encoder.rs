//! FLAC encoding of captured snippets for upload recognizers

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::error::Verify;
use thiserror::Error;

use crate::domain::track::AudioSnippet;

const BITS_PER_SAMPLE: usize = 16;
const CHANNELS: usize = 1;

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Snippet is empty")]
    Empty,

    #[error("Encoder configuration error: {0}")]
    Config(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Write failed: {0}")]
    Write(String),
}

/// Encode a mono 16-bit snippet as a FLAC stream
pub fn encode_snippet(snippet: &AudioSnippet) -> Result<Vec<u8>, EncodingError> {
    if snippet.is_empty() {
        return Err(EncodingError::Empty);
    }

    let config = flacenc::config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| EncodingError::Config(format!("{:?}", e)))?;

    let widened: Vec<i32> = snippet.samples().iter().map(|&s| i32::from(s)).collect();
    let source = flacenc::source::MemSource::from_samples(
        &widened,
        CHANNELS,
        BITS_PER_SAMPLE,
        snippet.sample_rate() as usize,
    );

    let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| EncodingError::Encode(format!("{:?}", e)))?;

    let mut sink = ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|e| EncodingError::Write(format!("{:?}", e)))?;

    Ok(sink.into_inner())
}
