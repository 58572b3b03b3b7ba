//! Daemon command handler - sends commands to running daemon via IPC

use super::args::DaemonAction;
use super::ipc::{create_ipc_client, IpcClient};
use super::presenter::Presenter;
use super::signals::ControlCommand;

impl From<DaemonAction> for ControlCommand {
    fn from(action: DaemonAction) -> Self {
        match action {
            DaemonAction::Start => Self::Start,
            DaemonAction::Stop => Self::Stop,
            DaemonAction::Status => Self::Status,
            DaemonAction::Ping => Self::Ping,
            DaemonAction::Manual { text } => Self::Manual(text),
        }
    }
}

/// Handle daemon subcommand
pub async fn handle_daemon_command(
    action: DaemonAction,
    presenter: &Presenter,
) -> Result<(), String> {
    let client = create_ipc_client();
    send_action(client.as_ref(), action, presenter).await
}

async fn send_action(
    client: &dyn IpcClient,
    action: DaemonAction,
    presenter: &Presenter,
) -> Result<(), String> {
    if !client.is_daemon_running() {
        return Err("No daemon running. Start with: trackcast --daemon".to_string());
    }

    let command = ControlCommand::from(action);
    let response = client
        .send_command(&command.to_line())
        .await
        .map_err(|e| format!("Failed to communicate with daemon: {}", e))?;
    let response = response.trim();

    if let Some(stripped) = response.strip_prefix("error:") {
        return Err(stripped.trim().to_string());
    }

    match command {
        ControlCommand::Status => presenter.daemon_status(response),
        ControlCommand::Manual(_) => presenter.success("Manual event sent"),
        ControlCommand::Ping => presenter.success("Test ping sent"),
        other => presenter.info(&format!("Command sent: {}", other.to_line())),
    }

    Ok(())
}
