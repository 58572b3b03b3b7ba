//! Default-input snippet capture using cpal
//!
//! Records from the default input device at whatever rate it offers, folds
//! all channels into mono and resamples to 16 kHz for the recognizers.

use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rubato::{FftFixedIn, Resampler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::ports::{CaptureError, SnippetCapturer};
use crate::domain::schedule::Duration;
use crate::domain::track::{AudioSnippet, RECOGNITION_SAMPLE_RATE};

/// How often the recording thread checks for cancellation
const CANCEL_POLL: StdDuration = StdDuration::from_millis(50);

const RESAMPLER_CHUNK: usize = 1024;

pub struct CpalCapturer;

impl CpalCapturer {
    pub fn new() -> Self {
        Self
    }

    fn input_device() -> Result<cpal::Device, CaptureError> {
        cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)
    }

    /// Pick an i16/f32 input config, preferring fewer channels and a range
    /// that covers 16 kHz.
    fn input_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), CaptureError> {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| CaptureError::StartFailed(format!("Failed to query input configs: {}", e)))?;

        let covers_target = |range: &cpal::SupportedStreamConfigRange| {
            range.min_sample_rate().0 <= RECOGNITION_SAMPLE_RATE
                && range.max_sample_rate().0 >= RECOGNITION_SAMPLE_RATE
        };

        let best = ranges
            .filter(|range| matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32))
            .min_by_key(|range| (!covers_target(range), range.channels()))
            .ok_or_else(|| CaptureError::StartFailed("No supported input format".into()))?;

        let sample_rate = if covers_target(&best) {
            SampleRate(RECOGNITION_SAMPLE_RATE)
        } else {
            best.min_sample_rate()
        };

        let config = StreamConfig {
            channels: best.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, best.sample_format()))
    }

    /// Average interleaved frames into one channel
    fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
        if channels <= 1 {
            return samples.to_vec();
        }
        samples
            .chunks(channels as usize)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    }

    fn resample(samples: &[i16], source_rate: u32) -> Result<Vec<i16>, CaptureError> {
        if source_rate == RECOGNITION_SAMPLE_RATE || samples.is_empty() {
            return Ok(samples.to_vec());
        }

        let input: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
        let expected_len =
            (input.len() as f64 * RECOGNITION_SAMPLE_RATE as f64 / source_rate as f64).ceil() as usize;

        let mut resampler = FftFixedIn::<f32>::new(
            source_rate as usize,
            RECOGNITION_SAMPLE_RATE as usize,
            RESAMPLER_CHUNK,
            2,
            1,
        )
        .map_err(|e| CaptureError::CaptureFailed(format!("Resampler init failed: {}", e)))?;

        let mut output = Vec::with_capacity(expected_len);
        let mut pos = 0;
        while pos < input.len() {
            let wanted = resampler.input_frames_next();
            let end = (pos + wanted).min(input.len());
            let mut chunk = input[pos..end].to_vec();
            chunk.resize(wanted, 0.0);

            let resampled = resampler
                .process(&[chunk], None)
                .map_err(|e| CaptureError::CaptureFailed(format!("Resampling failed: {}", e)))?;
            output.extend(
                resampled[0]
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
            );
            pos = end;
        }

        output.truncate(expected_len);
        Ok(output)
    }

    /// Blocking recording loop. Returns the device rate and mono samples.
    fn record_blocking(
        duration: StdDuration,
        cancel: CancellationToken,
    ) -> Result<(u32, Vec<i16>), CaptureError> {
        let device = Self::input_device()?;
        let (config, format) = Self::input_config(&device)?;
        let channels = config.channels;
        let rate = config.sample_rate.0;
        debug!(rate, channels, ?format, "Opening input stream");

        let buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let on_error = |err: cpal::StreamError| warn!("Input stream error: {}", err);

        let stream = match format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let mono = Self::downmix(data, channels);
                    sink.lock().unwrap_or_else(|e| e.into_inner()).extend(mono);
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let pcm: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    let mono = Self::downmix(&pcm, channels);
                    sink.lock().unwrap_or_else(|e| e.into_inner()).extend(mono);
                },
                on_error,
                None,
            ),
            other => {
                return Err(CaptureError::StartFailed(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

        let started = Instant::now();
        while started.elapsed() < duration {
            if cancel.is_cancelled() {
                drop(stream);
                return Err(CaptureError::Cancelled);
            }
            std::thread::sleep(CANCEL_POLL.min(duration.saturating_sub(started.elapsed())));
        }
        drop(stream);

        let samples = std::mem::take(&mut *buffer.lock().unwrap_or_else(|e| e.into_inner()));
        Ok((rate, samples))
    }
}

impl Default for CpalCapturer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnippetCapturer for CpalCapturer {
    async fn capture(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<AudioSnippet, CaptureError> {
        if cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }

        let length = duration.as_std();
        let token = cancel.clone();
        let (rate, samples) =
            tokio::task::spawn_blocking(move || Self::record_blocking(length, token))
                .await
                .map_err(|e| CaptureError::CaptureFailed(format!("Capture task failed: {}", e)))??;

        if samples.is_empty() {
            return Err(CaptureError::CaptureFailed("No audio data captured".into()));
        }

        let resampled = tokio::task::spawn_blocking(move || Self::resample(&samples, rate))
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("Resample task failed: {}", e)))??;

        let snippet = AudioSnippet::new(resampled, RECOGNITION_SAMPLE_RATE);
        debug!(size = %snippet.human_readable_size(), "Snippet captured");
        Ok(snippet)
    }
}
