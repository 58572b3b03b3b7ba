//! Scheduling domain module

mod duration;
mod schedule_state;

pub use duration::{Duration, DEFAULT_INTERVAL_SECS, DEFAULT_SNIPPET_SECS};
pub use schedule_state::ScheduleState;
