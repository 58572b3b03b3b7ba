//! Countdown bookkeeping for the periodic recognition schedule

use std::time::Duration as StdDuration;

use tokio::time::Instant;

/// Next-fire countdown plus the configured interval.
///
/// The countdown is re-armed to the full interval whenever a cycle is
/// triggered, either by the periodic timer or by an external pre-emption.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    interval: StdDuration,
    next_fire: Option<Instant>,
}

impl ScheduleState {
    /// Create a disarmed schedule for the given interval
    pub fn new(interval: StdDuration) -> Self {
        Self {
            interval,
            next_fire: None,
        }
    }

    pub fn interval(&self) -> StdDuration {
        self.interval
    }

    /// Whether the schedule is armed
    pub fn is_armed(&self) -> bool {
        self.next_fire.is_some()
    }

    /// Instant of the next scheduled cycle
    pub fn next_fire(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Re-arm so the next cycle fires one full interval after `now`
    pub fn reset(&mut self, now: Instant) {
        self.next_fire = Some(now + self.interval);
    }

    /// Disarm the schedule
    pub fn clear(&mut self) {
        self.next_fire = None;
    }

    /// Whole seconds until the next cycle, rounded up. Never negative.
    pub fn seconds_remaining(&self, now: Instant) -> Option<u64> {
        self.next_fire.map(|at| {
            let left = at.saturating_duration_since(now);
            let secs = left.as_secs();
            if left.subsec_nanos() > 0 {
                secs + 1
            } else {
                secs
            }
        })
    }
}
