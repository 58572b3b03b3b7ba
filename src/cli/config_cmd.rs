//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{
    AppConfig, GenerationConfig, GeneratorProvider, OscConfig, RecognitionConfig,
    RecognizerProvider,
};
use crate::domain::error::ConfigError;
use crate::domain::schedule::Duration;

use super::args::{is_secret_key, is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => {
            presenter.output(&store.path().to_string_lossy());
            Ok(())
        }
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    set_value(&mut config, key, value)?;
    store.save(&config).await?;

    let shown = if is_secret_key(key) {
        mask_api_key(value)
    } else {
        value.to_string()
    };
    presenter.success(&format!("{} = {}", key, shown));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let config = store.load().await?;
    presenter.output(&display_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()));
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        let value = display_value(&config, key).unwrap_or_else(|| NOT_SET.to_string());
        presenter.key_value(key, &value);
    }
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "interval" | "snippet_duration" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "recognition.provider" => {
            value
                .parse::<RecognizerProvider>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "generation.provider" => {
            value
                .parse::<GeneratorProvider>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "osc.port" | "osc.listen_port" => {
            parse_port(value).map_err(|message| invalid(key, message))?;
        }
        "osc.external_address" => {
            if !value.starts_with('/') || value.contains(char::is_whitespace) {
                return Err(invalid(
                    key,
                    "OSC address must start with '/' and contain no spaces",
                ));
            }
        }
        "generation.base_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid(key, "Base URL must start with http:// or https://"));
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_port(value: &str) -> Result<u16, String> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("Invalid port '{}'. Use 1-65535", value)),
        Ok(port) => Ok(port),
    }
}

/// Store `value` (already validated) under `key`
fn set_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let text = Some(value.to_string());
    match key {
        "interval" => config.interval = text,
        "snippet_duration" => config.snippet_duration = text,
        "recognition.provider" | "recognition.api_key" => {
            let section = config
                .recognition
                .get_or_insert_with(RecognitionConfig::default);
            if key == "recognition.provider" {
                section.provider = text;
            } else {
                section.api_key = text;
            }
        }
        "generation.provider"
        | "generation.api_key"
        | "generation.model"
        | "generation.base_url"
        | "generation.instructions" => {
            let section = config
                .generation
                .get_or_insert_with(GenerationConfig::default);
            match key {
                "generation.provider" => section.provider = text,
                "generation.api_key" => section.api_key = text,
                "generation.model" => section.model = text,
                "generation.base_url" => section.base_url = text,
                _ => section.instructions = text,
            }
        }
        "osc.host" | "osc.port" | "osc.listen_port" | "osc.external_address" => {
            let section = config.osc.get_or_insert_with(OscConfig::default);
            match key {
                "osc.host" => section.host = text,
                "osc.port" => section.port = Some(parse_port(value).map_err(|m| invalid(key, m))?),
                "osc.listen_port" => {
                    section.listen_port = Some(parse_port(value).map_err(|m| invalid(key, m))?)
                }
                _ => section.external_address = text,
            }
        }
        _ => return Err(invalid(key, "Unknown key")),
    }
    Ok(())
}

/// Stored value for `key`, masked when secret
fn display_value(config: &AppConfig, key: &str) -> Option<String> {
    let recognition = config.recognition.as_ref();
    let generation = config.generation.as_ref();
    let osc = config.osc.as_ref();

    let value = match key {
        "interval" => config.interval.clone(),
        "snippet_duration" => config.snippet_duration.clone(),
        "recognition.provider" => recognition.and_then(|r| r.provider.clone()),
        "recognition.api_key" => recognition.and_then(|r| r.api_key.clone()),
        "generation.provider" => generation.and_then(|g| g.provider.clone()),
        "generation.api_key" => generation.and_then(|g| g.api_key.clone()),
        "generation.model" => generation.and_then(|g| g.model.clone()),
        "generation.base_url" => generation.and_then(|g| g.base_url.clone()),
        "generation.instructions" => generation.and_then(|g| g.instructions.clone()),
        "osc.host" => osc.and_then(|o| o.host.clone()),
        "osc.port" => osc.and_then(|o| o.port).map(|p| p.to_string()),
        "osc.listen_port" => osc.and_then(|o| o.listen_port).map(|p| p.to_string()),
        "osc.external_address" => osc.and_then(|o| o.external_address.clone()),
        _ => None,
    }?;

    Some(if is_secret_key(key) {
        mask_api_key(&value)
    } else {
        value
    })
}

/// Mask API key for display (show first 4 and last 4 chars)
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::XdgConfigStore;
    use tempfile::TempDir;

    #[test]
    fn mask_api_key_long() {
        assert_eq!(mask_api_key("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn mask_api_key_short() {
        assert_eq!(mask_api_key("short"), "*****");
    }

    #[test]
    fn validate_durations() {
        assert!(validate_config_value("interval", "5m").is_ok());
        assert!(validate_config_value("snippet_duration", "12s").is_ok());
        assert!(validate_config_value("interval", "soon").is_err());
    }

    #[test]
    fn validate_providers() {
        assert!(validate_config_value("recognition.provider", "audd-stream").is_ok());
        assert!(validate_config_value("recognition.provider", "shazam").is_err());
        assert!(validate_config_value("generation.provider", "claude").is_ok());
        assert!(validate_config_value("generation.provider", "markov").is_err());
    }

    #[test]
    fn validate_ports() {
        assert!(validate_config_value("osc.port", "9000").is_ok());
        assert!(validate_config_value("osc.port", "0").is_err());
        assert!(validate_config_value("osc.listen_port", "70000").is_err());
    }

    #[test]
    fn validate_address_and_url() {
        assert!(validate_config_value("osc.external_address", "/track/external").is_ok());
        assert!(validate_config_value("osc.external_address", "track").is_err());
        assert!(validate_config_value("generation.base_url", "http://localhost:11434").is_ok());
        assert!(validate_config_value("generation.base_url", "localhost").is_err());
    }

    #[test]
    fn set_value_creates_sections() {
        let mut config = AppConfig::empty();
        set_value(&mut config, "generation.model", "gpt-4o").unwrap();
        set_value(&mut config, "osc.port", "7000").unwrap();
        set_value(&mut config, "recognition.api_key", "secret-key-123").unwrap();

        assert_eq!(config.generation_model(), Some("gpt-4o"));
        assert_eq!(config.osc_port_or_default(), 7000);
        assert_eq!(config.recognition_api_key(), Some("secret-key-123"));
    }

    #[test]
    fn display_masks_keys() {
        let mut config = AppConfig::empty();
        set_value(&mut config, "generation.api_key", "sk-1234567890abcd").unwrap();
        assert_eq!(
            display_value(&config, "generation.api_key").as_deref(),
            Some("sk-1...abcd")
        );
        assert_eq!(display_value(&config, "osc.host"), None);
    }

    #[tokio::test]
    async fn set_then_get_through_store() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let presenter = Presenter::new();

        handle_config_command(
            ConfigAction::Set {
                key: "osc.host".into(),
                value: "10.1.1.1".into(),
            },
            &store,
            &presenter,
        )
        .await
        .unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.osc_host(), Some("10.1.1.1"));
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));

        let result = handle_config_command(
            ConfigAction::Get {
                key: "domain".into(),
            },
            &store,
            &Presenter::new(),
        )
        .await;
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }
}
