//! Inbound OSC listener for tracks announced by other instances

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use rosc::{decoder, OscPacket, OscType};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::application::ports::{ExternalEventSource, ExternalSourceError};
use crate::domain::track::{parse_external_track, Track};

const RECV_BUFFER: usize = 8192;

/// Listens on a UDP port for `song:<TITLE> from:<ARTIST>` announcements
pub struct OscExternalSource {
    socket: UdpSocket,
    address: String,
    backlog: Mutex<VecDeque<Track>>,
}

impl OscExternalSource {
    /// Bind on all interfaces at `port`, accepting messages sent to `address`
    pub async fn bind(port: u16, address: impl Into<String>) -> Result<Self, ExternalSourceError> {
        Self::bind_addr(SocketAddr::from(([0, 0, 0, 0], port)), address).await
    }

    pub async fn bind_addr(
        addr: SocketAddr,
        address: impl Into<String>,
    ) -> Result<Self, ExternalSourceError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| ExternalSourceError::BindFailed(format!("{}: {}", addr, e)))?;
        let address = address.into();
        info!(%addr, %address, "Listening for external tracks");
        Ok(Self {
            socket,
            address,
            backlog: Mutex::new(VecDeque::new()),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    /// Well-formed tracks carried by `packet` on our address, in order
    fn tracks_in(&self, packet: OscPacket, found: &mut Vec<Track>) {
        match packet {
            OscPacket::Bundle(bundle) => {
                for inner in bundle.content {
                    self.tracks_in(inner, found);
                }
            }
            OscPacket::Message(message) if message.addr == self.address => {
                let payload = message.args.into_iter().find_map(|arg| match arg {
                    OscType::String(s) => Some(s),
                    _ => None,
                });
                match payload.as_deref().and_then(parse_external_track) {
                    Some(track) => found.push(track),
                    None => debug!(?payload, "Dropping malformed external track"),
                }
            }
            OscPacket::Message(message) => {
                debug!(addr = %message.addr, "Ignoring OSC message on other address");
            }
        }
    }

    fn pop_backlog(&self) -> Option<Track> {
        self.backlog
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl ExternalEventSource for OscExternalSource {
    async fn next_track(&self) -> Result<Option<Track>, ExternalSourceError> {
        if let Some(track) = self.pop_backlog() {
            return Ok(Some(track));
        }

        let mut buf = vec![0u8; RECV_BUFFER];
        loop {
            let (len, from) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| ExternalSourceError::ReceiveFailed(e.to_string()))?;

            let packet = match decoder::decode_udp(&buf[..len]) {
                Ok((_, packet)) => packet,
                Err(e) => {
                    debug!(%from, error = ?e, "Dropping undecodable datagram");
                    continue;
                }
            };

            let mut found = Vec::new();
            self.tracks_in(packet, &mut found);
            let mut found = found.into_iter();
            if let Some(first) = found.next() {
                self.backlog
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .extend(found);
                debug!(%from, track = %first, "External track received");
                return Ok(Some(first));
            }
        }
    }
}
