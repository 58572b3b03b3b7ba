//! Daemon control channel
//!
//! The daemon listens on a Unix Domain Socket and answers every one-line
//! command with a one-line reply.

mod unix_socket;

pub use unix_socket::{SocketPath, UnixSocketClient, UnixSocketServer};

use std::io;
use tokio::sync::mpsc;

use super::signals::ControlRequest;

/// Daemon side of the control channel
#[async_trait::async_trait]
pub trait IpcServer: Send + Sync {
    fn bind(&mut self) -> io::Result<()>;

    /// Display form of the bound endpoint
    fn path(&self) -> String;

    /// Accept clients forever. Each parsed command goes to `tx` as a
    /// [`ControlRequest`] and its reply is written back to the client.
    async fn run(&self, tx: mpsc::Sender<ControlRequest>) -> io::Result<()>;

    fn cleanup(&self);
}

/// Client side used by `trackcast daemon ...`
#[async_trait::async_trait]
pub trait IpcClient: Send + Sync {
    /// Whether the endpoint exists
    fn is_daemon_running(&self) -> bool;

    /// Send one command line, return the raw reply line
    async fn send_command(&self, cmd: &str) -> io::Result<String>;
}

pub fn create_ipc_server() -> Box<dyn IpcServer> {
    Box::new(UnixSocketServer::new(SocketPath::new()))
}

pub fn create_ipc_client() -> Box<dyn IpcClient> {
    Box::new(UnixSocketClient::new(SocketPath::new()))
}
