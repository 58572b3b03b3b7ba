//! Outbound publishers and the inbound external-track listener

mod noop;
mod osc;
mod osc_listener;

use std::sync::Arc;

pub use noop::NoOpPublisher;
pub use osc::{encode_event, OscPublisher};
pub use osc_listener::OscExternalSource;

use crate::application::ports::NotificationPublisher;
use crate::domain::config::AppConfig;

/// OSC publisher for the configured host, or a no-op when none is set
pub fn create_publisher(config: &AppConfig) -> Arc<dyn NotificationPublisher> {
    match config.osc_host() {
        Some(host) => Arc::new(OscPublisher::new(host.trim(), config.osc_port_or_default())),
        None => Arc::new(NoOpPublisher::new()),
    }
}
