//! Main app runner for one-shot mode

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use crate::application::ports::{ConfigStore, NotificationPublisher};
use crate::application::{IdentifyCallbacks, IdentifyError, IdentifyInput, IdentifyOnceUseCase};
use crate::domain::config::{
    AppConfig, GenerationConfig, GeneratorProvider, OscConfig, RecognitionConfig,
    RecognizerProvider,
};
use crate::domain::schedule::Duration;
use crate::infrastructure::{
    create_generator, create_publisher, create_recognizer, CpalCapturer, NoOpPublisher,
    XdgConfigStore,
};

use super::args::Cli;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;
/// Capture and lookup succeeded but nothing matched
pub const EXIT_NO_MATCH: u8 = 3;

/// Environment variable overriding `recognition.api_key`
pub const ENV_RECOGNITION_KEY: &str = "TRACKCAST_RECOGNITION_KEY";
/// Environment variable overriding `generation.api_key`
pub const ENV_GENERATION_KEY: &str = "TRACKCAST_GENERATION_KEY";

/// Run one capture -> identify -> generate -> publish pass
pub async fn run_oneshot(config: AppConfig, publish: bool) -> ExitCode {
    let mut presenter = Presenter::new();

    let capturer = Arc::new(CpalCapturer::new());
    let recognizer = create_recognizer(&config);
    let generator = create_generator(&config);
    let publisher: Arc<dyn NotificationPublisher> = if publish {
        create_publisher(&config)
    } else {
        Arc::new(NoOpPublisher::new())
    };

    if publish && !publisher.is_configured() {
        presenter.warn("No OSC host configured, printing only (set osc.host to publish)");
    }

    let use_case = IdentifyOnceUseCase::new(capturer, recognizer, generator, publisher);

    let shutdown = ShutdownSignal::new(use_case.cancel_token());
    if let Err(e) = shutdown.setup() {
        presenter.error(&format!("Failed to setup signal handler: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let snippet_duration = config.snippet_duration_or_default();
    presenter.start_spinner(&format!("Listening for {}...", snippet_duration));
    let callbacks = spinner_callbacks(&presenter);

    let input = IdentifyInput {
        snippet_duration,
        publish,
    };

    match use_case.execute(input, callbacks).await {
        Ok(output) => match output.track {
            Some(track) => {
                presenter.spinner_success(&format!("Identified ({})", output.snippet_size));
                presenter.track(&track);
                if output.published {
                    presenter.info("Sent to OSC receiver");
                }
                ExitCode::from(EXIT_SUCCESS)
            }
            None => {
                presenter.spinner_fail("No match");
                ExitCode::from(EXIT_NO_MATCH)
            }
        },
        Err(e) => {
            if shutdown.is_shutdown() || matches!(e, IdentifyError::Cancelled) {
                presenter.spinner_fail("Cancelled");
            } else {
                presenter.spinner_fail("Failed");
                presenter.error(&e.to_string());
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn spinner_callbacks(presenter: &Presenter) -> IdentifyCallbacks {
    let Some(spinner) = presenter.spinner_handle() else {
        return IdentifyCallbacks::default();
    };
    let on_end = spinner.clone();
    let on_identify = spinner.clone();
    let on_generate = spinner;

    IdentifyCallbacks {
        on_capture_start: None,
        on_capture_end: Some(Box::new(move |size: &str| {
            on_end.set_message(format!("Captured {}", size));
        })),
        on_identify_start: Some(Box::new(move || {
            on_identify.set_message("Identifying...");
        })),
        on_generate_start: Some(Box::new(move || {
            on_generate.set_message("Generating prompts...");
        })),
    }
}

/// Overrides taken from command-line flags
pub fn cli_overrides(cli: &Cli) -> AppConfig {
    let recognition = cli.recognizer.clone().map(|provider| RecognitionConfig {
        provider: Some(provider),
        api_key: None,
    });
    let generation = cli.generator.clone().map(|provider| GenerationConfig {
        provider: Some(provider),
        ..Default::default()
    });
    let osc = if cli.osc_host.is_some() || cli.osc_port.is_some() {
        Some(OscConfig {
            host: cli.osc_host.clone(),
            port: cli.osc_port,
            ..Default::default()
        })
    } else {
        None
    };

    AppConfig {
        interval: cli.interval.clone(),
        snippet_duration: cli.duration.clone(),
        recognition,
        generation,
        osc,
    }
}

/// Overrides taken from the environment
pub fn env_overrides() -> AppConfig {
    let var = |name: &str| env::var(name).ok().filter(|s| !s.trim().is_empty());

    AppConfig {
        recognition: var(ENV_RECOGNITION_KEY).map(|key| RecognitionConfig {
            provider: None,
            api_key: Some(key),
        }),
        generation: var(ENV_GENERATION_KEY).map(|key| GenerationConfig {
            api_key: Some(key),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Load and merge configuration: defaults < file < env < cli
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring unreadable config file");
        AppConfig::empty()
    });

    AppConfig::defaults()
        .merge(file_config)
        .merge(env_overrides())
        .merge(cli_config)
}

/// Reject values the typed accessors would silently replace with defaults
pub fn validate_config(config: &AppConfig) -> Result<(), String> {
    if let Some(ref interval) = config.interval {
        interval
            .parse::<Duration>()
            .map_err(|e| format!("Invalid interval: {}", e))?;
    }
    if let Some(ref snippet) = config.snippet_duration {
        snippet
            .parse::<Duration>()
            .map_err(|e| format!("Invalid duration: {}", e))?;
    }
    if let Some(provider) = config.recognition.as_ref().and_then(|r| r.provider.as_ref()) {
        provider
            .parse::<RecognizerProvider>()
            .map_err(|e| format!("Invalid recognizer: {}", e))?;
    }
    if let Some(provider) = config.generation.as_ref().and_then(|g| g.provider.as_ref()) {
        provider
            .parse::<GeneratorProvider>()
            .map_err(|e| format!("Invalid generator: {}", e))?;
    }
    Ok(())
}
