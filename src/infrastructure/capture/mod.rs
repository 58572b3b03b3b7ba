//! Audio capture adapters

mod cpal_capturer;
mod flac_encoder;

pub use cpal_capturer::CpalCapturer;
pub use flac_encoder::{encode_snippet, EncodingError};
