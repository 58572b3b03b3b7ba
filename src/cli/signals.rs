//! Signal handlers and daemon control commands

use colored::Colorize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Cancels a token on Ctrl+C (one-shot mode)
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Bind to the token the run should abort on
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Setup signal handler
    pub fn setup(&self) -> Result<(), std::io::Error> {
        let token = self.token.clone();

        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            sigint.recv().await;
            token.cancel();
        });

        Ok(())
    }
}

/// Commands the daemon loop understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Status,
    Ping,
    /// Send free text as a manual event
    Manual(String),
    /// Stop and exit (SIGINT/SIGTERM)
    Shutdown,
}

impl ControlCommand {
    /// Parse one line of the socket protocol. `Shutdown` has no wire form.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(' ')
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((line, ""));

        match (word, rest) {
            ("start", "") => Some(Self::Start),
            ("stop", "") => Some(Self::Stop),
            ("status", "") => Some(Self::Status),
            ("ping", "") => Some(Self::Ping),
            ("manual", text) if !text.is_empty() => Some(Self::Manual(text.to_string())),
            _ => None,
        }
    }

    /// Wire form sent by the client, without the trailing newline
    pub fn to_line(&self) -> String {
        match self {
            Self::Start => "start".into(),
            Self::Stop => "stop".into(),
            Self::Status => "status".into(),
            Self::Ping => "ping".into(),
            Self::Manual(text) => format!("manual {}", text.replace('\n', " ")),
            Self::Shutdown => "shutdown".into(),
        }
    }
}

/// A command plus where to send the one-line reply
#[derive(Debug)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub reply: Option<oneshot::Sender<String>>,
}

impl ControlRequest {
    /// Request that expects a reply
    pub fn with_reply(command: ControlCommand) -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// Fire-and-forget request
    pub fn notify(command: ControlCommand) -> Self {
        Self {
            command,
            reply: None,
        }
    }

    /// Answer the sender, if it is still waiting
    pub fn respond(self, response: impl Into<String>) {
        if let Some(tx) = self.reply {
            let _ = tx.send(response.into());
        }
    }
}

/// Daemon signal handler
///
/// Turns SIGINT/SIGTERM into [`ControlCommand::Shutdown`] and hands out a
/// sender for other sources (the socket server) to feed the same loop.
pub struct DaemonSignalHandler {
    receiver: mpsc::Receiver<ControlRequest>,
}

impl DaemonSignalHandler {
    pub fn new() -> Result<(Self, mpsc::Sender<ControlRequest>), std::io::Error> {
        let (tx, rx) = mpsc::channel(16);

        for (kind, name) in [
            (SignalKind::interrupt(), "SIGINT"),
            (SignalKind::terminate(), "SIGTERM"),
        ] {
            let tx = tx.clone();
            let mut stream = signal(kind)?;
            tokio::spawn(async move {
                stream.recv().await;
                eprintln!("{} Received {} (shutdown)", "↓".cyan(), name);
                let _ = tx
                    .send(ControlRequest::notify(ControlCommand::Shutdown))
                    .await;
            });
        }

        Ok((Self { receiver: rx }, tx))
    }

    /// Wait for the next request
    pub async fn recv(&mut self) -> Option<ControlRequest> {
        self.receiver.recv().await
    }
}
