//! OSC over UDP publisher

use std::net::SocketAddr;

use async_trait::async_trait;
use rosc::{encoder, OscMessage, OscPacket, OscType};
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::application::ports::{NotificationPublisher, PublishError};
use crate::domain::event::{EventValue, OutboundEvent};

/// Encode an event as a single OSC message at `/<path>`
pub fn encode_event(event: &OutboundEvent) -> Result<Vec<u8>, PublishError> {
    let arg = match event.value() {
        EventValue::Text(text) => OscType::String(text.clone()),
        EventValue::Float(value) => OscType::Float(*value),
    };
    let packet = OscPacket::Message(OscMessage {
        addr: format!("/{}", event.path().trim_start_matches('/')),
        args: vec![arg],
    });

    encoder::encode(&packet).map_err(|e| PublishError::EncodeFailed {
        path: event.path().to_string(),
        message: format!("{:?}", e),
    })
}

struct Link {
    socket: UdpSocket,
    target: SocketAddr,
}

/// Sends every event as one UDP datagram to `host:port`.
///
/// The target is resolved and the socket bound on first use.
pub struct OscPublisher {
    host: String,
    port: u16,
    link: OnceCell<Link>,
}

impl OscPublisher {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            link: OnceCell::new(),
        }
    }

    async fn connect(&self) -> Result<Link, PublishError> {
        let target = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| PublishError::SendFailed(format!("Cannot resolve {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| PublishError::SendFailed(format!("No address for {}", self.host)))?;

        let local = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| PublishError::SendFailed(e.to_string()))?;
        debug!(%target, "OSC publisher ready");
        Ok(Link { socket, target })
    }
}

#[async_trait]
impl NotificationPublisher for OscPublisher {
    fn is_configured(&self) -> bool {
        true
    }

    fn endpoint(&self) -> Option<String> {
        Some(format!("{}:{}", self.host, self.port))
    }

    async fn publish(&self, event: &OutboundEvent) -> Result<(), PublishError> {
        let bytes = encode_event(event)?;
        let link = self.link.get_or_try_init(|| self.connect()).await?;
        link.socket
            .send_to(&bytes, link.target)
            .await
            .map_err(|e| PublishError::SendFailed(e.to_string()))?;
        debug!(%event, "OSC sent");
        Ok(())
    }
}
