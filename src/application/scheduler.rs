//! Cancellable timers driving the recognition schedule
//!
//! Every timer runs as a tokio task bound to a [`CancellationToken`]. Dropping
//! a [`TimerHandle`] cancels its task.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::schedule::ScheduleState;

/// Handle to a spawned timer task
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Call `tick` every `period`, first call one period from now
pub fn every<F>(period: StdDuration, parent: &CancellationToken, mut tick: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let token = parent.child_token();
    let cancelled = token.clone();
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = ticker.tick() => tick(),
            }
        }
    });
    TimerHandle { token, task }
}

/// Fire `on_fire` whenever the shared schedule comes due.
///
/// On each fire the schedule is re-armed for a full interval before
/// `on_fire` runs. Anyone resetting the schedule elsewhere must call
/// `rearm.notify_one()` so the timer picks up the new deadline.
pub fn periodic<F>(
    schedule: Arc<Mutex<ScheduleState>>,
    rearm: Arc<Notify>,
    parent: &CancellationToken,
    mut on_fire: F,
) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let token = parent.child_token();
    let cancelled = token.clone();
    let task = tokio::spawn(async move {
        loop {
            let next = schedule
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .next_fire();

            match next {
                Some(at) => {
                    tokio::select! {
                        _ = cancelled.cancelled() => break,
                        _ = rearm.notified() => {
                            debug!("Schedule re-armed");
                        }
                        _ = time::sleep_until(at) => {
                            schedule
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .reset(Instant::now());
                            on_fire();
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = cancelled.cancelled() => break,
                        _ = rearm.notified() => {}
                    }
                }
            }
        }
    });
    TimerHandle { token, task }
}
