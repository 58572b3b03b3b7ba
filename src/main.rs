//! Trackcast CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use trackcast::cli::{
    app::{
        cli_overrides, load_merged_config, run_oneshot, validate_config, EXIT_ERROR,
        EXIT_USAGE_ERROR,
    },
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    daemon_app::run_daemon,
    daemon_cmd::handle_daemon_command,
    presenter::Presenter,
};
use trackcast::infrastructure::XdgConfigStore;

fn init_logging() {
    let filter = EnvFilter::try_from_env("TRACKCAST_LOG")
        .unwrap_or_else(|_| EnvFilter::new("trackcast=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();
    let presenter = Presenter::new();

    match cli.command {
        Some(Commands::Config { action }) => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        Some(Commands::Daemon { action }) => {
            if let Err(e) = handle_daemon_command(action, &presenter).await {
                presenter.error(&e);
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        None => {}
    }

    let config = load_merged_config(cli_overrides(&cli)).await;
    if let Err(e) = validate_config(&config) {
        presenter.error(&e);
        return ExitCode::from(EXIT_USAGE_ERROR);
    }

    if cli.daemon {
        run_daemon(config).await
    } else {
        run_oneshot(config, !cli.no_publish).await
    }
}
