//! Streaming recognizer over a WebSocket session
//!
//! The session receives a burst of pre-buffered audio followed by one
//! binary PCM frame per second. The server pushes its verdict as a JSON
//! text frame whenever it is ready, so the call is guarded by a failsafe
//! timer slightly longer than the snippet itself.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::response::AuddResponse;
use super::PendingCalls;
use crate::application::ports::{RecognitionError, Recognizer};
use crate::domain::config::RecognizerProvider;
use crate::domain::track::{AudioSnippet, Track};

pub const STREAM_URL: &str = "wss://api.audd.io/ws/";

/// Audio pushed immediately when the session opens
const PREBUFFER: Duration = Duration::from_secs(3);

const FRAME: Duration = Duration::from_secs(1);

/// Extra time allowed past the snippet length before giving up
const FAILSAFE_MARGIN: Duration = Duration::from_secs(5);

type Outcome = Result<Option<Track>, RecognitionError>;

pub struct StreamingRecognizer {
    api_key: String,
    endpoint: String,
    pacing: Duration,
    failsafe_margin: Duration,
    pending: PendingCalls,
}

impl StreamingRecognizer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, STREAM_URL)
    }

    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            pacing: FRAME,
            failsafe_margin: FAILSAFE_MARGIN,
            pending: PendingCalls::new(),
        }
    }

    /// Delay between frames after the pre-buffer burst
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_failsafe_margin(mut self, margin: Duration) -> Self {
        self.failsafe_margin = margin;
        self
    }

    fn session_url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}api_token={}&return=apple_music,spotify",
            self.endpoint, separator, self.api_key
        )
    }

    /// Push frames and wait for the first result frame
    async fn run_session(
        url: String,
        frames: Vec<Vec<u8>>,
        prebuffer: usize,
        pacing: Duration,
    ) -> Outcome {
        let (socket, _) = connect_async(&url)
            .await
            .map_err(|e| RecognitionError::NetworkError(e.to_string()))?;
        let (mut write, mut read) = socket.split();

        let mut queue: VecDeque<Vec<u8>> = frames.into();
        let mut sent = 0usize;
        let mut next_send = Instant::now();

        let outcome = loop {
            tokio::select! {
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        break AuddResponse::parse(&text).and_then(AuddResponse::into_track);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            break Err(RecognitionError::NetworkError(e.to_string()));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break Err(RecognitionError::NetworkError(
                            "Session closed before a result arrived".into(),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(RecognitionError::NetworkError(e.to_string())),
                },
                _ = time::sleep_until(next_send), if !queue.is_empty() => {
                    if let Some(frame) = queue.pop_front() {
                        if let Err(e) = write.send(Message::Binary(frame.into())).await {
                            break Err(RecognitionError::NetworkError(e.to_string()));
                        }
                        sent += 1;
                        if sent >= prebuffer {
                            next_send = Instant::now() + pacing;
                        }
                    }
                }
            }
        };

        if let Err(e) = write.close().await {
            debug!("Closing stream session: {}", e);
        }
        outcome
    }
}

#[async_trait]
impl Recognizer for StreamingRecognizer {
    fn provider(&self) -> RecognizerProvider {
        RecognizerProvider::AuddStream
    }

    fn credentials_valid(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn identify(
        &self,
        snippet: &AudioSnippet,
        cancel: &CancellationToken,
    ) -> Result<Option<Track>, RecognitionError> {
        if !self.credentials_valid() {
            return Err(RecognitionError::MissingCredentials);
        }
        if cancel.is_cancelled() {
            return Err(RecognitionError::Cancelled);
        }

        let frames = snippet.pcm_frames(FRAME);
        let prebuffer = (PREBUFFER.as_millis() / FRAME.as_millis()) as usize;
        let failsafe = snippet.duration() + self.failsafe_margin;

        let aborted = self.pending.begin();
        let session = cancel.child_token();
        let (tx, rx) = oneshot::channel::<Outcome>();

        let url = self.session_url();
        let pacing = self.pacing;
        let session_token = session.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = session_token.cancelled() => {}
                outcome = Self::run_session(url, frames, prebuffer, pacing) => {
                    let _ = tx.send(outcome);
                }
            }
        });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RecognitionError::Cancelled),
            _ = aborted.cancelled() => Err(RecognitionError::Cancelled),
            outcome = rx => outcome.unwrap_or_else(|_| {
                Err(RecognitionError::NetworkError("Stream session ended without a result".into()))
            }),
            _ = time::sleep(failsafe) => {
                warn!(?failsafe, "No streaming result before failsafe");
                Err(RecognitionError::Timeout)
            }
        };

        session.cancel();
        result
    }

    fn cancel(&self) {
        self.pending.cancel();
    }
}
