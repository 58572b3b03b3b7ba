//! Recognizer adapters

mod audd;
mod response;
mod streaming;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

pub use audd::{AuddRecognizer, AUDD_API_URL};
pub use streaming::{StreamingRecognizer, STREAM_URL};

use crate::application::ports::Recognizer;
use crate::domain::config::{AppConfig, RecognizerProvider};

/// Create the recognizer selected in `config`.
///
/// A missing key still yields a recognizer; it reports
/// `MissingCredentials` when asked to identify.
pub fn create_recognizer(config: &AppConfig) -> Arc<dyn Recognizer> {
    let key = config.recognition_api_key().unwrap_or_default();
    match config.recognizer_provider_or_default() {
        RecognizerProvider::Audd => Arc::new(AuddRecognizer::new(key)),
        RecognizerProvider::AuddStream => Arc::new(StreamingRecognizer::new(key)),
    }
}

/// Abort switch shared by every in-flight `identify` of one recognizer.
///
/// `cancel` trips the current token; the next call after that gets a fresh one.
#[derive(Debug, Default)]
pub(crate) struct PendingCalls {
    token: Mutex<CancellationToken>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&self) -> CancellationToken {
        let mut token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    pub(crate) fn cancel(&self) {
        self.token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_trips_every_pending_call() {
        let pending = PendingCalls::new();
        let a = pending.begin();
        let b = pending.begin();
        pending.cancel();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[test]
    fn next_call_after_cancel_starts_clean() {
        let pending = PendingCalls::new();
        pending.cancel();
        assert!(!pending.begin().is_cancelled());
    }

    #[test]
    fn factory_follows_provider() {
        let mut config = AppConfig::defaults();
        assert_eq!(create_recognizer(&config).provider(), RecognizerProvider::Audd);

        config.recognition.get_or_insert_with(Default::default).provider =
            Some("audd-stream".into());
        let recognizer = create_recognizer(&config);
        assert_eq!(recognizer.provider(), RecognizerProvider::AuddStream);
        assert!(!recognizer.credentials_valid());
    }
}
