//! Outbound event namespace

mod outbound;
mod status;

pub use outbound::{EventValue, OutboundEvent};
pub use status::CycleStatus;
