//! Daemon app runner

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::ports::ExternalEventSource;
use crate::application::{OrchestratorConfig, OrchestratorStatus, RecognitionOrchestrator};
use crate::domain::config::AppConfig;
use crate::infrastructure::{
    create_generator, create_publisher, create_recognizer, CpalCapturer, OscExternalSource,
};

use super::app::{EXIT_ERROR, EXIT_SUCCESS};
use super::ipc::create_ipc_server;
use super::pid_file::{PidFile, PidFileError};
use super::presenter::{format_countdown, format_status_line, Presenter};
use super::signals::{ControlCommand, ControlRequest, DaemonSignalHandler};

/// Run daemon mode
pub async fn run_daemon(config: AppConfig) -> ExitCode {
    let presenter = Presenter::new();

    let pid_file = PidFile::new();
    if let Err(e) = pid_file.acquire() {
        match e {
            PidFileError::AlreadyRunning(pid) => {
                presenter.error(&format!("Another daemon is already running (PID: {})", pid));
            }
            _ => {
                presenter.error(&e.to_string());
            }
        }
        return ExitCode::from(EXIT_ERROR);
    }

    let orchestrator = build_orchestrator(&config);
    let run_config = OrchestratorConfig::from(&config);

    let (mut signals, request_tx) = match DaemonSignalHandler::new() {
        Ok(s) => s,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut ipc_server = create_ipc_server();
    if let Err(e) = ipc_server.bind() {
        presenter.error(&format!("Failed to bind socket: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }
    let socket_display = ipc_server.path();
    tokio::spawn(async move {
        if let Err(e) = ipc_server.run(request_tx).await {
            warn!(error = %e, "Control socket stopped");
        }
    });

    let shutdown = CancellationToken::new();

    let listen_port = config.osc_listen_port_or_default();
    match OscExternalSource::bind(listen_port, config.osc_external_address_or_default()).await {
        Ok(source) => {
            let source: Arc<dyn ExternalEventSource> = Arc::new(source);
            orchestrator.listen_external(source, shutdown.child_token());
            info!(port = listen_port, "Listening for external tracks");
        }
        Err(e) => presenter.warn(&format!("External tracks disabled: {}", e)),
    }

    tokio::spawn(report_status(orchestrator.subscribe(), shutdown.child_token()));

    if let Err(e) = orchestrator.start(run_config).await {
        presenter.error(&format!("Failed to start recognition: {}", e));
        shutdown.cancel();
        let _ = pid_file.release();
        return ExitCode::from(EXIT_ERROR);
    }

    presenter.daemon_status(&format!(
        "Started, next cycle every {}",
        run_config.interval
    ));
    presenter.info(&format!(
        "PID: {} | Socket: {} | SIGINT: exit",
        std::process::id(),
        socket_display
    ));

    let result = daemon_loop(&orchestrator, run_config, &mut signals, &presenter).await;

    shutdown.cancel();
    let _ = pid_file.release();

    if result {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

fn build_orchestrator(config: &AppConfig) -> RecognitionOrchestrator {
    RecognitionOrchestrator::new(
        Arc::new(CpalCapturer::new()),
        create_recognizer(config),
        create_generator(config),
        create_publisher(config),
    )
}

/// Serve control requests until shutdown. Returns false if the request
/// channel closed unexpectedly.
async fn daemon_loop(
    orchestrator: &RecognitionOrchestrator,
    config: OrchestratorConfig,
    signals: &mut DaemonSignalHandler,
    presenter: &Presenter,
) -> bool {
    while let Some(request) = signals.recv().await {
        if request.command == ControlCommand::Shutdown {
            presenter.daemon_status("Shutting down...");
            orchestrator.stop().await;
            request.respond("ok");
            return true;
        }
        handle_request(orchestrator, config, request).await;
    }
    false
}

async fn handle_request(
    orchestrator: &RecognitionOrchestrator,
    config: OrchestratorConfig,
    request: ControlRequest,
) {
    let reply = match request.command {
        ControlCommand::Start => reply_for(orchestrator.start(config).await),
        ControlCommand::Stop => {
            orchestrator.stop().await;
            "ok".to_string()
        }
        ControlCommand::Status => format_status_line(&orchestrator.status()),
        ControlCommand::Ping => reply_for(orchestrator.send_test_ping().await),
        ControlCommand::Manual(ref text) => reply_for(orchestrator.send_manual_event(text).await),
        ControlCommand::Shutdown => "ok".to_string(),
    };
    request.respond(reply);
}

fn reply_for<E: std::fmt::Display>(result: Result<(), E>) -> String {
    match result {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    }
}

/// Print state changes and newly identified tracks
async fn report_status(mut rx: watch::Receiver<OrchestratorStatus>, shutdown: CancellationToken) {
    let presenter = Presenter::new();
    let mut last = rx.borrow().clone();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = rx.borrow_and_update().clone();

                if status.state != last.state || status.message != last.message {
                    let countdown = status
                        .seconds_until_next
                        .map(|s| format!(" (next in {})", format_countdown(s)))
                        .unwrap_or_default();
                    presenter.daemon_status(&format!("{}{}", status.message, countdown));
                }

                let new_track = match (&status.current_track, &last.current_track) {
                    (Some(now), Some(before)) => now != before,
                    (Some(_), None) => true,
                    _ => false,
                };
                if new_track {
                    if let Some(ref track) = status.current_track {
                        presenter.track(track);
                    }
                }

                last = status;
            }
        }
    }
}
