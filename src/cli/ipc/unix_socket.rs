//! Unix Domain Socket communication for daemon control

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{IpcClient, IpcServer};
use crate::cli::signals::{ControlCommand, ControlRequest};

const SOCKET_NAME: &str = "trackcast.sock";

/// Socket path resolver
#[derive(Debug, Clone)]
pub struct SocketPath {
    path: PathBuf,
}

impl SocketPath {
    /// Create socket path, preferring XDG_RUNTIME_DIR
    pub fn new() -> Self {
        let path = std::env::var("XDG_RUNTIME_DIR")
            .map(|dir| PathBuf::from(dir).join(SOCKET_NAME))
            .unwrap_or_else(|_| std::env::temp_dir().join(SOCKET_NAME));
        Self { path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the socket path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if socket file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove socket file if it exists
    pub fn cleanup(&self) -> io::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Default for SocketPath {
    fn default() -> Self {
        Self::new()
    }
}

/// Unix Domain Socket server for daemon commands
pub struct UnixSocketServer {
    socket_path: SocketPath,
    listener: Option<UnixListener>,
}

impl UnixSocketServer {
    pub fn new(socket_path: SocketPath) -> Self {
        Self {
            socket_path,
            listener: None,
        }
    }
}

impl Drop for UnixSocketServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[async_trait]
impl IpcServer for UnixSocketServer {
    fn bind(&mut self) -> io::Result<()> {
        // Stale socket from a crashed daemon
        self.socket_path.cleanup()?;

        let listener = UnixListener::bind(self.socket_path.path())?;
        self.listener = Some(listener);
        Ok(())
    }

    fn path(&self) -> String {
        self.socket_path.path().to_string_lossy().to_string()
    }

    async fn run(&self, tx: mpsc::Sender<ControlRequest>) -> io::Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Socket not bound"))?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, tx).await {
                            warn!(error = %e, "Socket connection error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Socket accept error");
                }
            }
        }
    }

    fn cleanup(&self) {
        let _ = self.socket_path.cleanup();
    }
}

/// Handle a single client connection
async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<ControlRequest>) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    debug!(command = line.trim(), "Control command received");

    let response = match ControlCommand::parse(&line) {
        Some(command) => {
            let (request, rx) = ControlRequest::with_reply(command);
            if tx.send(request).await.is_err() {
                "error: daemon is shutting down".to_string()
            } else {
                rx.await
                    .unwrap_or_else(|_| "error: no reply from daemon".to_string())
            }
        }
        None => "error: unknown command".to_string(),
    };

    writer.write_all(format!("{}\n", response).as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}

/// Unix Domain Socket client for sending commands to daemon
pub struct UnixSocketClient {
    socket_path: SocketPath,
}

impl UnixSocketClient {
    pub fn new(socket_path: SocketPath) -> Self {
        Self { socket_path }
    }
}

#[async_trait]
impl IpcClient for UnixSocketClient {
    fn is_daemon_running(&self) -> bool {
        self.socket_path.exists()
    }

    async fn send_command(&self, cmd: &str) -> io::Result<String> {
        let stream = UnixStream::connect(self.socket_path.path()).await?;
        let (reader, mut writer) = stream.into_split();

        writer.write_all(format!("{}\n", cmd).as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        reader.read_line(&mut response).await?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn socket_path_uses_xdg_runtime_dir() {
        let path = std::env::var("XDG_RUNTIME_DIR")
            .map(|dir| PathBuf::from(dir).join(SOCKET_NAME))
            .unwrap_or_else(|_| std::env::temp_dir().join(SOCKET_NAME));

        let socket_path = SocketPath::new();
        assert_eq!(socket_path.path(), path.as_path());
    }

    fn serve(dir: &TempDir) -> (SocketPath, mpsc::Receiver<ControlRequest>) {
        let socket = SocketPath::with_path(dir.path().join(SOCKET_NAME));
        let mut server = UnixSocketServer::new(socket.clone());
        server.bind().unwrap();
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = server.run(tx).await;
        });
        (socket, rx)
    }

    #[tokio::test]
    async fn forwards_command_and_returns_reply() {
        let dir = TempDir::new().unwrap();
        let (socket, mut rx) = serve(&dir);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let reply = match request.command {
                    ControlCommand::Manual(ref text) => format!("got {}", text),
                    _ => "ok".to_string(),
                };
                request.respond(reply);
            }
        });

        let client = UnixSocketClient::new(socket);
        assert!(client.is_daemon_running());
        assert_eq!(client.send_command("ping").await.unwrap(), "ok\n");
        assert_eq!(
            client.send_command("manual lights down").await.unwrap(),
            "got lights down\n"
        );
    }

    #[tokio::test]
    async fn unknown_command_gets_error_line() {
        let dir = TempDir::new().unwrap();
        let (socket, _rx) = serve(&dir);

        let client = UnixSocketClient::new(socket);
        let response = client.send_command("toggle").await.unwrap();
        assert_eq!(response, "error: unknown command\n");
    }

    #[tokio::test]
    async fn dropped_reply_is_reported() {
        let dir = TempDir::new().unwrap();
        let (socket, mut rx) = serve(&dir);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                drop(request);
            }
        });

        let client = UnixSocketClient::new(socket);
        let response = client.send_command("status").await.unwrap();
        assert!(response.starts_with("error:"));
    }

    #[tokio::test]
    async fn client_without_server_fails() {
        let dir = TempDir::new().unwrap();
        let client = UnixSocketClient::new(SocketPath::with_path(dir.path().join("none.sock")));
        assert!(!client.is_daemon_running());
        assert!(client.send_command("status").await.is_err());
    }
}
