//! Captured audio snippet value object

use std::time::Duration as StdDuration;

/// Sample rate recognizers expect (16 kHz mono)
pub const RECOGNITION_SAMPLE_RATE: u32 = 16_000;

/// A finite mono recording of 16-bit PCM samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSnippet {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioSnippet {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A snippet of `duration` silence at `sample_rate`
    pub fn silence(duration: StdDuration, sample_rate: u32) -> Self {
        let len = (duration.as_millis() as u64 * sample_rate as u64 / 1000) as usize;
        Self::new(vec![0; len], sample_rate)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Recorded length
    pub fn duration(&self) -> StdDuration {
        if self.sample_rate == 0 {
            return StdDuration::ZERO;
        }
        StdDuration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Raw little-endian PCM bytes
    pub fn to_pcm_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Split into little-endian PCM byte frames of `frame` length each.
    /// The last frame may be shorter.
    pub fn pcm_frames(&self, frame: StdDuration) -> Vec<Vec<u8>> {
        let per_frame = (frame.as_millis() as u64 * self.sample_rate as u64 / 1000).max(1) as usize;
        self.samples
            .chunks(per_frame)
            .map(|chunk| chunk.iter().flat_map(|s| s.to_le_bytes()).collect())
            .collect()
    }

    /// Size of the raw PCM payload in bytes
    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }

    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes() as f64;
        match self.size_bytes() {
            n if n < 1024 => format!("{} B", n),
            n if n < 1024 * 1024 => format!("{:.1} KB", bytes / 1024.0),
            _ => format!("{:.1} MB", bytes / (1024.0 * 1024.0)),
        }
    }
}
