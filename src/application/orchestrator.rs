//! Recognition orchestrator use case
//!
//! Sequences capture -> identify -> generate -> publish cycles on a periodic
//! schedule, with single-flight triggering, cooperative cancellation and
//! pre-emption by externally identified tracks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration as StdDuration;

use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::config::AppConfig;
use crate::domain::cycle::{CycleSession, CycleState};
use crate::domain::error::ConfigError;
use crate::domain::event::{CycleStatus, OutboundEvent};
use crate::domain::schedule::{Duration, ScheduleState};
use crate::domain::track::{PromptSet, Track};

use super::ports::{
    CaptureError, ExternalEventSource, GenerationError, NotificationPublisher, PromptGenerator,
    PublishError, RecognitionError, Recognizer, SnippetCapturer,
};
use super::scheduler::{self, TimerHandle};

const COUNTDOWN_PERIOD: StdDuration = StdDuration::from_secs(1);

/// Errors from the orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Recognition is already running")]
    AlreadyRunning,

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Timing for a running orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Time between scheduled cycles
    pub interval: Duration,
    /// Length of each captured snippet
    pub snippet_duration: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::default_interval(),
            snippet_duration: Duration::default_snippet(),
        }
    }
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            interval: config.interval_or_default(),
            snippet_duration: config.snippet_duration_or_default(),
        }
    }
}

/// Observability snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorStatus {
    pub state: CycleState,
    pub message: String,
    pub seconds_until_next: Option<u64>,
    pub current_track: Option<Track>,
}

impl Default for OrchestratorStatus {
    fn default() -> Self {
        Self {
            state: CycleState::Idle,
            message: "Idle".to_string(),
            seconds_until_next: None,
            current_track: None,
        }
    }
}

/// Drives the recognition pipeline.
///
/// Cheap to clone; all clones share one state machine.
#[derive(Clone)]
pub struct RecognitionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    capturer: Arc<dyn SnippetCapturer>,
    recognizer: Arc<dyn Recognizer>,
    generator: Option<Arc<dyn PromptGenerator>>,
    publisher: Arc<dyn NotificationPublisher>,
    session: Mutex<CycleSession>,
    message: Mutex<String>,
    in_flight: AtomicBool,
    epoch: AtomicU64,
    run: Mutex<Option<RunContext>>,
    cycle: Mutex<Option<ActiveCycle>>,
    current: Mutex<CurrentTrack>,
    schedule: Arc<Mutex<ScheduleState>>,
    rearm: Arc<Notify>,
    status_tx: watch::Sender<OrchestratorStatus>,
}

/// Present while started
struct RunContext {
    token: CancellationToken,
    config: OrchestratorConfig,
    _periodic: TimerHandle,
    _countdown: TimerHandle,
}

struct ActiveCycle {
    epoch: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct CurrentTrack {
    track: Option<Track>,
    epoch: u64,
}

/// Holds the single-flight flag; clears it on drop
struct FlightGuard {
    inner: Arc<Inner>,
}

impl FlightGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl RecognitionOrchestrator {
    /// Create an idle orchestrator. `generator` is optional; without one,
    /// cycles publish metadata only.
    pub fn new(
        capturer: Arc<dyn SnippetCapturer>,
        recognizer: Arc<dyn Recognizer>,
        generator: Option<Arc<dyn PromptGenerator>>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        let (status_tx, _) = watch::channel(OrchestratorStatus::default());
        Self {
            inner: Arc::new(Inner {
                capturer,
                recognizer,
                generator,
                publisher,
                session: Mutex::new(CycleSession::new()),
                message: Mutex::new("Idle".to_string()),
                in_flight: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                run: Mutex::new(None),
                cycle: Mutex::new(None),
                current: Mutex::new(CurrentTrack::default()),
                schedule: Arc::new(Mutex::new(ScheduleState::new(
                    Duration::default_interval().as_std(),
                ))),
                rearm: Arc::new(Notify::new()),
                status_tx,
            }),
        }
    }

    /// Start listening: validates recognizer credentials, runs one cycle
    /// immediately and arms the periodic schedule.
    pub async fn start(&self, config: OrchestratorConfig) -> Result<(), OrchestratorError> {
        let inner = &self.inner;
        if !inner.recognizer.credentials_valid() {
            let provider = inner.recognizer.provider();
            warn!(%provider, "Refusing to start: recognizer credentials invalid");
            return Err(ConfigError::InvalidCredentials(provider.label().to_string()).into());
        }

        {
            let mut session = lock(&inner.session);
            if !session.is_idle() {
                return Err(OrchestratorError::AlreadyRunning);
            }
            session
                .transition_to(CycleState::Listening)
                .map_err(|_| OrchestratorError::AlreadyRunning)?;
        }

        let token = CancellationToken::new();
        {
            let mut schedule = lock(&inner.schedule);
            *schedule = ScheduleState::new(config.interval.as_std());
            schedule.reset(Instant::now());
        }

        let weak = Arc::downgrade(inner);
        let periodic = scheduler::periodic(
            Arc::clone(&inner.schedule),
            Arc::clone(&inner.rearm),
            &token,
            move || {
                if let Some(inner) = weak.upgrade() {
                    Inner::trigger(&inner, "periodic");
                }
            },
        );
        let weak: Weak<Inner> = Arc::downgrade(inner);
        let countdown = scheduler::every(COUNTDOWN_PERIOD, &token, move || {
            if let Some(inner) = weak.upgrade() {
                inner.refresh_status();
            }
        });

        *lock(&inner.run) = Some(RunContext {
            token,
            config,
            _periodic: periodic,
            _countdown: countdown,
        });

        info!(
            interval = %config.interval,
            snippet = %config.snippet_duration,
            recognizer = %inner.recognizer.provider(),
            "Recognition started"
        );
        inner.set_message("Listening");
        inner.announce(CycleStatus::Listening).await;

        Inner::trigger(inner, "start");
        Ok(())
    }

    /// Stop listening and return to idle. Cancels any in-flight cycle and
    /// waits for it to settle. Safe to call when already idle.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let Some(run) = lock(&inner.run).take() else {
            debug!("Stop requested while idle");
            return;
        };

        run.token.cancel();
        inner.force_state(CycleState::Cancelled);
        inner.recognizer.cancel();

        let active = lock(&inner.cycle).take();
        if let Some(active) = active {
            active.token.cancel();
            if let Err(e) = active.handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Recognition cycle panicked");
                }
            }
        }
        drop(run);

        lock(&inner.schedule).clear();
        inner.force_state(CycleState::Idle);
        inner.set_message("Stopped");
        inner.announce(CycleStatus::Stopped).await;
        info!("Recognition stopped");
    }

    /// Forward free text to the receiver, independent of the cycle
    pub async fn send_manual_event(&self, text: &str) -> Result<(), OrchestratorError> {
        self.send_direct(OutboundEvent::manual(text)).await
    }

    /// Send the `test` = `"ping"` connectivity check
    pub async fn send_test_ping(&self) -> Result<(), OrchestratorError> {
        self.send_direct(OutboundEvent::test_ping()).await
    }

    async fn send_direct(&self, event: OutboundEvent) -> Result<(), OrchestratorError> {
        let publisher = &self.inner.publisher;
        if !publisher.is_configured() {
            return Err(ConfigError::EndpointUnconfigured.into());
        }
        debug!(%event, "Sending direct event");
        publisher.publish(&event).await?;
        Ok(())
    }

    /// Handle a track identified elsewhere.
    ///
    /// Pre-empts any in-flight cycle, resets the countdown to a full
    /// interval and publishes `track` without capturing. Ignored when idle.
    pub async fn on_external_track(&self, track: Track) {
        let inner = &self.inner;
        let Some(root) = inner.run_token() else {
            debug!(track = %track, "External track ignored while idle");
            return;
        };
        info!(track = %track, "External track received, pre-empting");

        let guard = loop {
            inner.preempt_active().await;
            if root.is_cancelled() {
                return;
            }
            if let Some(guard) = FlightGuard::acquire(inner) {
                break guard;
            }
            // A trigger slipped in between; pre-empt it as well.
            tokio::task::yield_now().await;
        };

        {
            // stop() clears the schedule after cancelling the run token
            let mut schedule = lock(&inner.schedule);
            if root.is_cancelled() {
                return;
            }
            schedule.reset(Instant::now());
        }
        inner.rearm.notify_one();

        let epoch = inner.next_epoch();
        let token = root.child_token();
        let task_inner = Arc::clone(inner);
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task_inner.publish_track(epoch, &task_token, track).await;
        });
        *lock(&inner.cycle) = Some(ActiveCycle {
            epoch,
            token,
            handle,
        });
    }

    /// Feed tracks from `source` into [`Self::on_external_track`] until
    /// `shutdown` fires or the source closes.
    pub fn listen_external(
        &self,
        source: Arc<dyn ExternalEventSource>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = source.next_track() => match next {
                        Ok(Some(track)) => orchestrator.on_external_track(track).await,
                        Ok(None) => {
                            debug!("External source closed");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "External source failed");
                            tokio::time::sleep(StdDuration::from_secs(1)).await;
                        }
                    },
                }
            }
        })
    }

    /// Current snapshot
    pub fn status(&self) -> OrchestratorStatus {
        self.inner.snapshot()
    }

    /// Receive a snapshot on every transition and countdown tick
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn state(&self) -> CycleState {
        lock(&self.inner.session).state()
    }

    pub fn current_track(&self) -> Option<Track> {
        lock(&self.inner.current).track.clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.run).is_some()
    }
}

impl Inner {
    fn run_token(&self) -> Option<CancellationToken> {
        lock(&self.run).as_ref().map(|r| r.token.clone())
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Start a cycle unless one is already in flight
    fn trigger(inner: &Arc<Self>, reason: &'static str) {
        let Some(guard) = FlightGuard::acquire(inner) else {
            debug!(reason, "Cycle already in flight, dropping trigger");
            return;
        };
        let Some((root, config)) = lock(&inner.run)
            .as_ref()
            .map(|r| (r.token.clone(), r.config))
        else {
            return;
        };

        let epoch = inner.next_epoch();
        let token = root.child_token();
        debug!(reason, epoch, "Triggering recognition cycle");

        let task_inner = Arc::clone(inner);
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task_inner
                .run_cycle(epoch, &task_token, config.snippet_duration)
                .await;
        });
        *lock(&inner.cycle) = Some(ActiveCycle {
            epoch,
            token,
            handle,
        });
    }

    /// Cancel the active cycle, wait for it, and return to Listening
    async fn preempt_active(&self) {
        let active = lock(&self.cycle).take();
        if let Some(active) = active {
            debug!(epoch = active.epoch, "Cancelling active cycle");
            active.token.cancel();
            self.recognizer.cancel();
            if let Err(e) = active.handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Recognition cycle panicked");
                }
            }
        }

        {
            let mut session = lock(&self.session);
            let state = session.state();
            let interrupted = state.is_in_cycle()
                || matches!(state, CycleState::NoMatch | CycleState::Error);
            if interrupted {
                if let Err(e) = session.transition_to(CycleState::Listening) {
                    warn!(error = %e, "Could not return to listening after pre-emption");
                }
            }
        }
        self.refresh_status();
    }

    async fn run_cycle(&self, epoch: u64, token: &CancellationToken, snippet: Duration) {
        if !self.advance(token, CycleState::Capturing, "Capturing audio").await {
            return;
        }
        let snippet = match self.capturer.capture(snippet, token).await {
            Ok(snippet) => snippet,
            Err(_) if token.is_cancelled() => return,
            Err(CaptureError::Cancelled) => return,
            Err(e) => {
                self.fail(token, format!("Capture failed: {}", e)).await;
                return;
            }
        };
        debug!(size = %snippet.human_readable_size(), "Snippet captured");

        if !self
            .advance(token, CycleState::Identifying, "Recognizing")
            .await
        {
            return;
        }
        let track = match self.recognizer.identify(&snippet, token).await {
            Ok(Some(track)) => track,
            Ok(None) => {
                info!("No match");
                if self.advance(token, CycleState::NoMatch, "No match").await {
                    self.advance(token, CycleState::Listening, "Listening").await;
                }
                return;
            }
            Err(_) if token.is_cancelled() => return,
            Err(RecognitionError::Cancelled) => return,
            Err(e) => {
                self.fail(token, format!("Recognition failed: {}", e)).await;
                return;
            }
        };

        info!(track = %track, "Track identified");
        self.publish_track(epoch, token, track).await;
    }

    /// Publish `track`, generate prompts and republish. Shared by scheduled
    /// cycles and injected external tracks.
    async fn publish_track(&self, epoch: u64, token: &CancellationToken, track: Track) {
        let generator = self.generator.as_ref().filter(|g| g.is_configured());
        // A stored track still awaiting prompts was interrupted mid-generation
        // and must not short-circuit the retry.
        let previous = lock(&self.current).track.clone();
        if let Some(stored) = previous.filter(|p| {
            p.is_same_track(&track) && (generator.is_none() || !p.prompts().is_empty())
        }) {
            debug!(track = %stored, "Same track as current, republishing without generation");
            if !self
                .advance_quiet(token, CycleState::Publishing, format!("Republishing {}", stored))
            {
                return;
            }
            self.publish_events(&OutboundEvent::track_metadata(&stored)).await;
            self.publish_events(&OutboundEvent::track_prompts(&stored)).await;
            self.advance(token, CycleState::Listening, "Listening").await;
            return;
        }

        let bare = track.without_prompts();
        if !self.commit(epoch, token, bare.clone()) {
            return;
        }
        if !self
            .advance(token, CycleState::Publishing, format!("Identified {}", bare))
            .await
        {
            return;
        }
        self.publish_events(&OutboundEvent::track_metadata(&bare)).await;

        if let Some(generator) = generator {
            if !self
                .advance(token, CycleState::GeneratingPrompts, "Generating prompts")
                .await
            {
                return;
            }
            let prompts = match generator.generate(&bare, token).await {
                Ok(prompts) => prompts,
                Err(_) if token.is_cancelled() => return,
                Err(GenerationError::Cancelled) => return,
                Err(e) => {
                    warn!(provider = %generator.provider(), error = %e, "Prompt generation failed");
                    PromptSet::diagnostic(&bare, format!("Prompt generation failed: {}", e))
                }
            };
            debug!(count = prompts.len(), diagnostic = prompts.is_diagnostic(), "Prompts ready");

            let enriched = bare.with_prompts(prompts);
            if !self.commit(epoch, token, enriched.clone()) {
                return;
            }
            if !self
                .advance(token, CycleState::Publishing, "Publishing prompts")
                .await
            {
                return;
            }
            self.publish_events(&OutboundEvent::track_metadata(&enriched))
                .await;
            self.publish_events(&OutboundEvent::track_prompts(&enriched))
                .await;
        }

        self.advance(token, CycleState::Listening, "Listening").await;
    }

    /// Replace the current track unless this cycle was cancelled or a newer
    /// trigger already committed
    fn commit(&self, epoch: u64, token: &CancellationToken, track: Track) -> bool {
        let mut current = lock(&self.current);
        if token.is_cancelled() || epoch < current.epoch {
            debug!(epoch, committed = current.epoch, "Discarding stale result");
            return false;
        }
        current.track = Some(track);
        current.epoch = epoch;
        true
    }

    async fn fail(&self, token: &CancellationToken, message: String) {
        warn!("{}", message);
        if self.advance(token, CycleState::Error, message).await {
            self.advance(token, CycleState::Listening, "Listening").await;
        }
    }

    /// Transition and announce the new status if it changed.
    /// Returns false (and writes nothing) once `token` is cancelled.
    async fn advance(
        &self,
        token: &CancellationToken,
        next: CycleState,
        message: impl Into<String>,
    ) -> bool {
        let before = lock(&self.session).state().status();
        if !self.advance_quiet(token, next, message) {
            return false;
        }
        if next.status() != before {
            self.announce(next.status()).await;
        }
        true
    }

    fn advance_quiet(
        &self,
        token: &CancellationToken,
        next: CycleState,
        message: impl Into<String>,
    ) -> bool {
        {
            let mut session = lock(&self.session);
            if token.is_cancelled() {
                return false;
            }
            if let Err(e) = session.transition_to(next) {
                warn!(error = %e, "Ignoring invalid transition");
                return false;
            }
        }
        self.set_message(message);
        true
    }

    /// Transition owned by the canceller; no-op if already there
    fn force_state(&self, next: CycleState) {
        {
            let mut session = lock(&self.session);
            if session.state() != next {
                if let Err(e) = session.transition_to(next) {
                    warn!(error = %e, "Unexpected transition during stop");
                }
            }
        }
        self.refresh_status();
    }

    fn set_message(&self, message: impl Into<String>) {
        *lock(&self.message) = message.into();
        self.refresh_status();
    }

    async fn announce(&self, status: CycleStatus) {
        if !self.publisher.is_configured() {
            return;
        }
        if let Err(e) = self.publisher.publish(&OutboundEvent::status(status)).await {
            warn!(%status, error = %e, "Failed to publish status");
        }
    }

    async fn publish_events(&self, events: &[OutboundEvent]) {
        if events.is_empty() || !self.publisher.is_configured() {
            return;
        }
        if let Err(e) = self.publisher.publish_all(events).await {
            warn!(error = %e, "Failed to publish track events");
        }
    }

    fn snapshot(&self) -> OrchestratorStatus {
        let state = lock(&self.session).state();
        let seconds_until_next = lock(&self.schedule).seconds_remaining(Instant::now());
        OrchestratorStatus {
            state,
            message: lock(&self.message).clone(),
            seconds_until_next,
            current_track: lock(&self.current).track.clone(),
        }
    }

    fn refresh_status(&self) {
        let snapshot = self.snapshot();
        self.status_tx.send_if_modified(|status| {
            if *status == snapshot {
                false
            } else {
                *status = snapshot;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{GeneratorProvider, RecognizerProvider};
    use crate::domain::event::EventValue;
    use crate::domain::track::{AudioSnippet, Prompt};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    const SNIPPET_SECS: u64 = 10;

    // ----- mocks -----

    #[derive(Default)]
    struct MockCapturer {
        calls: AtomicUsize,
        cancelled: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl SnippetCapturer for MockCapturer {
        async fn capture(
            &self,
            duration: Duration,
            cancel: &CancellationToken,
        ) -> Result<AudioSnippet, CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CaptureError::NoInputDevice);
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    Err(CaptureError::Cancelled)
                }
                _ = sleep(duration.as_std()) => Ok(AudioSnippet::silence(duration.as_std(), 16_000)),
            }
        }
    }

    enum Reply {
        Track(Track),
        NoMatch,
        Fail(RecognitionError),
        Hang,
    }

    struct MockRecognizer {
        valid: bool,
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
        cancelled: AtomicUsize,
        cancel_calls: AtomicUsize,
    }

    impl MockRecognizer {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                valid: true,
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                cancelled: AtomicUsize::new(0),
                cancel_calls: AtomicUsize::new(0),
            }
        }

        fn invalid() -> Self {
            Self {
                valid: false,
                ..Self::new(vec![])
            }
        }
    }

    #[async_trait]
    impl Recognizer for MockRecognizer {
        fn provider(&self) -> RecognizerProvider {
            RecognizerProvider::Audd
        }

        fn credentials_valid(&self) -> bool {
            self.valid
        }

        async fn identify(
            &self,
            _snippet: &AudioSnippet,
            cancel: &CancellationToken,
        ) -> Result<Option<Track>, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::NoMatch);
            match reply {
                Reply::Track(t) => Ok(Some(t)),
                Reply::NoMatch => Ok(None),
                Reply::Fail(e) => Err(e),
                Reply::Hang => {
                    cancel.cancelled().await;
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    Err(RecognitionError::Cancelled)
                }
            }
        }

        fn cancel(&self) {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MockGenerator {
        calls: AtomicUsize,
        cancelled: AtomicUsize,
        fail: bool,
        /// Wait for cancellation on the first call only
        hang_first: AtomicBool,
    }

    impl MockGenerator {
        fn ok() -> Self {
            Self::default()
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn hanging_once() -> Self {
            Self {
                hang_first: AtomicBool::new(true),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PromptGenerator for MockGenerator {
        fn provider(&self) -> GeneratorProvider {
            GeneratorProvider::Ollama
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn generate(
            &self,
            track: &Track,
            cancel: &CancellationToken,
        ) -> Result<PromptSet, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_first.swap(false, Ordering::SeqCst) {
                cancel.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(GenerationError::Cancelled);
            }
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            if self.fail {
                return Err(GenerationError::InvalidResponse(500));
            }
            Ok(PromptSet::new(vec![
                Prompt::for_track(1, format!("{} one", track.title), track),
                Prompt::for_track(2, format!("{} two", track.title), track),
            ]))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        unconfigured: bool,
        events: Mutex<Vec<OutboundEvent>>,
    }

    impl RecordingPublisher {
        fn unconfigured() -> Self {
            Self {
                unconfigured: true,
                ..Default::default()
            }
        }

        fn texts(&self, path: &str) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.path() == path)
                .filter_map(|e| match e.value() {
                    EventValue::Text(s) => Some(s.clone()),
                    EventValue::Float(_) => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl NotificationPublisher for RecordingPublisher {
        fn is_configured(&self) -> bool {
            !self.unconfigured
        }

        fn endpoint(&self) -> Option<String> {
            (!self.unconfigured).then(|| "test".to_string())
        }

        async fn publish(&self, event: &OutboundEvent) -> Result<(), PublishError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Harness {
        orchestrator: RecognitionOrchestrator,
        capturer: Arc<MockCapturer>,
        recognizer: Arc<MockRecognizer>,
        generator: Arc<MockGenerator>,
        publisher: Arc<RecordingPublisher>,
    }

    fn harness(recognizer: MockRecognizer, generator: MockGenerator) -> Harness {
        harness_with(recognizer, generator, RecordingPublisher::default())
    }

    fn harness_with(
        recognizer: MockRecognizer,
        generator: MockGenerator,
        publisher: RecordingPublisher,
    ) -> Harness {
        let capturer = Arc::new(MockCapturer::default());
        let recognizer = Arc::new(recognizer);
        let generator = Arc::new(generator);
        let publisher = Arc::new(publisher);
        let orchestrator = RecognitionOrchestrator::new(
            capturer.clone(),
            recognizer.clone(),
            Some(generator.clone()),
            publisher.clone(),
        );
        Harness {
            orchestrator,
            capturer,
            recognizer,
            generator,
            publisher,
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            interval: Duration::from_secs(300),
            snippet_duration: Duration::from_secs(SNIPPET_SECS),
        }
    }

    /// Let spawned tasks run without moving the paused clock
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Sleep on the paused clock; timers due on the way fire in order
    async fn run_for(secs: u64) {
        sleep(StdDuration::from_secs(secs)).await;
        settle().await;
    }

    // ----- tests -----

    #[tokio::test(start_paused = true)]
    async fn start_with_invalid_credentials_stays_idle() {
        let h = harness(MockRecognizer::invalid(), MockGenerator::ok());

        let err = h.orchestrator.start(config()).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Config(ConfigError::InvalidCredentials(_))
        ));
        assert_eq!(h.orchestrator.state(), CycleState::Idle);
        assert!(!h.orchestrator.is_running());
        assert_eq!(h.orchestrator.status().seconds_until_next, None);

        run_for(600).await;
        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected() {
        let h = harness(MockRecognizer::new(vec![]), MockGenerator::ok());
        h.orchestrator.start(config()).await.unwrap();
        let err = h.orchestrator.start(config()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyRunning));
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_publishes_metadata_then_prompts() {
        let h = harness(
            MockRecognizer::new(vec![Reply::Track(Track::new("Song", "Artist"))]),
            MockGenerator::ok(),
        );
        h.orchestrator.start(config()).await.unwrap();
        settle().await;
        assert_eq!(h.orchestrator.state(), CycleState::Capturing);

        run_for(SNIPPET_SECS).await;

        assert_eq!(h.orchestrator.state(), CycleState::Listening);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
        let current = h.orchestrator.current_track().unwrap();
        assert_eq!(current.prompts().len(), 2);

        // Stage 1 and stage 2 both send metadata; prompts only in stage 2
        assert_eq!(h.publisher.texts("track/title"), ["Song", "Song"]);
        assert_eq!(h.publisher.texts("track/prompt1"), ["Song one"]);
        assert_eq!(
            h.publisher.texts("status"),
            ["listening", "recognizing", "identified", "listening"]
        );

        h.orchestrator.stop().await;
        assert_eq!(h.publisher.texts("status").last().unwrap(), "stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_trigger_dropped_while_cycle_active() {
        let h = harness(
            MockRecognizer::new(vec![Reply::Hang, Reply::NoMatch]),
            MockGenerator::ok(),
        );
        let cfg = OrchestratorConfig {
            interval: Duration::from_secs(30),
            snippet_duration: Duration::from_secs(SNIPPET_SECS),
        };
        h.orchestrator.start(cfg).await.unwrap();
        settle().await;

        // Identify hangs; two periodic ticks pass while it is in flight
        run_for(SNIPPET_SECS).await;
        assert_eq!(h.orchestrator.state(), CycleState::Identifying);
        run_for(30).await;
        run_for(30).await;

        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 1);
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_capture_cancels_and_idles() {
        let h = harness(MockRecognizer::new(vec![]), MockGenerator::ok());
        h.orchestrator.start(config()).await.unwrap();
        settle().await;
        assert_eq!(h.orchestrator.state(), CycleState::Capturing);

        h.orchestrator.stop().await;

        assert_eq!(h.capturer.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.recognizer.cancel_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.state(), CycleState::Idle);
        let status = h.orchestrator.status();
        assert_eq!(status.seconds_until_next, None);

        // Timers are disarmed
        run_for(1_000).await;
        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_identify_settles_cancelled() {
        let h = harness(MockRecognizer::new(vec![Reply::Hang]), MockGenerator::ok());
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        assert_eq!(h.orchestrator.state(), CycleState::Identifying);

        h.orchestrator.stop().await;

        assert_eq!(h.recognizer.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.state(), CycleState::Idle);
        assert!(!h.orchestrator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let h = harness(MockRecognizer::new(vec![]), MockGenerator::ok());
        h.orchestrator.stop().await;
        h.orchestrator.start(config()).await.unwrap();
        h.orchestrator.stop().await;
        h.orchestrator.stop().await;
        assert_eq!(h.orchestrator.state(), CycleState::Idle);
        assert_eq!(
            h.publisher
                .texts("status")
                .iter()
                .filter(|s| *s == "stopped")
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identical_track_does_not_regenerate() {
        let h = harness(
            MockRecognizer::new(vec![
                Reply::Track(Track::new("Song", "Artist")),
                Reply::Track(Track::new("Song", "Artist")),
            ]),
            MockGenerator::ok(),
        );
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        run_for(300).await;

        assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
        // Republished with the stored prompts, no second "identified"
        assert_eq!(h.publisher.texts("track/prompt1"), ["Song one", "Song one"]);
        assert_eq!(
            h.publisher
                .texts("status")
                .iter()
                .filter(|s| *s == "identified")
                .count(),
            1
        );
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_generation_settles_idle() {
        let h = harness(
            MockRecognizer::new(vec![Reply::Track(Track::new("Song", "Artist"))]),
            MockGenerator::hanging_once(),
        );
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        assert_eq!(h.orchestrator.state(), CycleState::GeneratingPrompts);

        h.orchestrator.stop().await;

        assert_eq!(h.generator.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.state(), CycleState::Idle);
        assert!(h.publisher.texts("track/prompt1").is_empty());
        assert_eq!(h.orchestrator.status().seconds_until_next, None);
        assert_eq!(h.publisher.texts("status").last().unwrap(), "stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn same_track_preempting_generation_regenerates() {
        let h = harness(
            MockRecognizer::new(vec![Reply::Track(Track::new("Song", "Artist"))]),
            MockGenerator::hanging_once(),
        );
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        assert_eq!(h.orchestrator.state(), CycleState::GeneratingPrompts);
        assert!(h.orchestrator.current_track().unwrap().prompts().is_empty());

        h.orchestrator
            .on_external_track(Track::new("Song", "Artist"))
            .await;
        settle().await;

        assert_eq!(h.generator.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.orchestrator.current_track().unwrap().prompts().len(), 2);
        assert_eq!(h.publisher.texts("track/prompt1"), ["Song one"]);
        assert_eq!(h.orchestrator.state(), CycleState::Listening);

        // Now that prompts are stored, the next identical result is deduplicated
        h.orchestrator
            .on_external_track(Track::new("Song", "Artist"))
            .await;
        settle().await;
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.publisher.texts("track/prompt1"), ["Song one", "Song one"]);
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn external_track_racing_stop_leaves_schedule_clear() {
        let h = harness(MockRecognizer::new(vec![Reply::Hang]), MockGenerator::ok());
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        assert_eq!(h.orchestrator.state(), CycleState::Identifying);

        tokio::join!(
            h.orchestrator
                .on_external_track(Track::new("Injected", "Remote")),
            h.orchestrator.stop(),
        );
        settle().await;

        assert_eq!(h.orchestrator.state(), CycleState::Idle);
        assert!(!h.orchestrator.is_running());
        assert_eq!(h.orchestrator.status().seconds_until_next, None);
        assert!(h.publisher.texts("track/title").is_empty());

        // No cycle fires from a leftover deadline
        run_for(600).await;
        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn case_difference_is_a_new_track() {
        let h = harness(
            MockRecognizer::new(vec![
                Reply::Track(Track::new("Song", "Artist")),
                Reply::Track(Track::new("song", "Artist")),
            ]),
            MockGenerator::ok(),
        );
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        run_for(300).await;

        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.orchestrator.current_track().unwrap().title, "song");
        assert_eq!(h.publisher.texts("track/prompt1"), ["Song one", "song one"]);
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn external_track_preempts_and_resets_countdown() {
        let h = harness(
            MockRecognizer::new(vec![Reply::NoMatch, Reply::Hang]),
            MockGenerator::ok(),
        );
        let cfg = OrchestratorConfig {
            interval: Duration::from_secs(300),
            snippet_duration: Duration::from_secs(SNIPPET_SECS),
        };
        // t=0: immediate cycle, no match
        h.orchestrator.start(cfg).await.unwrap();
        run_for(SNIPPET_SECS).await;
        assert_eq!(h.orchestrator.state(), CycleState::Listening);

        // t=100: external track arrives
        run_for(90).await;
        h.orchestrator
            .on_external_track(Track::new("Injected", "Remote"))
            .await;
        settle().await;

        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.publisher.texts("track/title"), ["Injected", "Injected"]);
        assert_eq!(h.orchestrator.current_track().unwrap().prompts().len(), 2);
        assert_eq!(h.orchestrator.status().seconds_until_next, Some(300));

        // Old deadline t=300 does not fire
        run_for(250).await;
        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 1);

        // New deadline t=400 does
        run_for(51).await;
        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 2);
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn external_track_cancels_in_flight_identify() {
        let h = harness(MockRecognizer::new(vec![Reply::Hang]), MockGenerator::ok());
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        assert_eq!(h.orchestrator.state(), CycleState::Identifying);

        h.orchestrator
            .on_external_track(Track::new("Injected", "Remote"))
            .await;
        settle().await;

        assert_eq!(h.recognizer.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.state(), CycleState::Listening);
        assert_eq!(h.orchestrator.current_track().unwrap().title, "Injected");
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn external_track_ignored_when_idle() {
        let h = harness(MockRecognizer::new(vec![]), MockGenerator::ok());
        h.orchestrator
            .on_external_track(Track::new("Injected", "Remote"))
            .await;
        settle().await;
        assert!(h.orchestrator.current_track().is_none());
        assert!(h.publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn capture_error_keeps_schedule() {
        let h = harness(MockRecognizer::new(vec![]), MockGenerator::ok());
        h.capturer.fail.store(true, Ordering::SeqCst);
        h.orchestrator.start(config()).await.unwrap();
        settle().await;

        assert_eq!(h.orchestrator.state(), CycleState::Listening);
        assert!(h.publisher.texts("status").contains(&"error".to_string()));

        h.capturer.fail.store(false, Ordering::SeqCst);
        run_for(300).await;
        assert_eq!(h.capturer.calls.load(Ordering::SeqCst), 2);
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn recognition_error_returns_to_listening() {
        let h = harness(
            MockRecognizer::new(vec![Reply::Fail(RecognitionError::InvalidResponse(502))]),
            MockGenerator::ok(),
        );
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;

        assert_eq!(h.orchestrator.state(), CycleState::Listening);
        assert!(h.orchestrator.current_track().is_none());
        assert!(h.publisher.texts("track/title").is_empty());
        assert_eq!(
            h.publisher.texts("status"),
            ["listening", "recognizing", "error", "listening"]
        );
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn generator_failure_publishes_placeholder() {
        let h = harness(
            MockRecognizer::new(vec![Reply::Track(Track::new("Song", "Artist"))]),
            MockGenerator::failing(),
        );
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;

        let current = h.orchestrator.current_track().unwrap();
        assert!(current.prompts().is_diagnostic());
        assert_eq!(current.prompts().len(), 1);
        let prompts = h.publisher.texts("track/prompt1");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Prompt generation failed"));
        assert_eq!(h.orchestrator.state(), CycleState::Listening);
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn without_generator_publishes_metadata_only() {
        let capturer = Arc::new(MockCapturer::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let orchestrator = RecognitionOrchestrator::new(
            capturer,
            Arc::new(MockRecognizer::new(vec![Reply::Track(Track::new("Song", "Artist"))])),
            None,
            publisher.clone(),
        );
        orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;

        assert_eq!(publisher.texts("track/title"), ["Song"]);
        assert!(publisher.texts("track/prompt1").is_empty());
        orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_event_requires_endpoint() {
        let h = harness_with(
            MockRecognizer::new(vec![]),
            MockGenerator::ok(),
            RecordingPublisher::unconfigured(),
        );
        let err = h.orchestrator.send_manual_event("hello").await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Config(ConfigError::EndpointUnconfigured)
        ));
        assert!(h.orchestrator.send_test_ping().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_event_is_independent_of_cycle() {
        let h = harness(MockRecognizer::new(vec![]), MockGenerator::ok());
        h.orchestrator.send_manual_event("drop incoming").await.unwrap();
        h.orchestrator.send_test_ping().await.unwrap();
        assert_eq!(h.publisher.texts("manual"), ["drop incoming"]);
        assert_eq!(h.publisher.texts("test"), ["ping"]);
        assert_eq!(h.orchestrator.state(), CycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_down() {
        let h = harness(MockRecognizer::new(vec![]), MockGenerator::ok());
        let mut rx = h.orchestrator.subscribe();
        h.orchestrator.start(config()).await.unwrap();
        run_for(SNIPPET_SECS).await;
        run_for(5).await;

        rx.borrow_and_update();
        assert_eq!(h.orchestrator.status().seconds_until_next, Some(285));
        run_for(1).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().seconds_until_next, Some(284));
        h.orchestrator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_of_cancelled_cycle_is_discarded() {
        let inner = harness(MockRecognizer::new(vec![]), MockGenerator::ok())
            .orchestrator
            .inner;
        let token = CancellationToken::new();
        assert!(inner.commit(2, &token, Track::new("Newer", "A")));
        // Older epoch loses
        assert!(!inner.commit(1, &token, Track::new("Older", "A")));
        token.cancel();
        assert!(!inner.commit(3, &token, Track::new("Cancelled", "A")));
        assert_eq!(lock(&inner.current).track.as_ref().unwrap().title, "Newer");
    }
}
