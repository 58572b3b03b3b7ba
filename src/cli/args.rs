//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};

/// Trackcast - identify what's playing and broadcast it over OSC
#[derive(Parser, Debug)]
#[command(name = "trackcast")]
#[command(version)]
#[command(about = "Identify the playing track and broadcast it with AI image prompts over OSC")]
#[command(long_about = None)]
pub struct Cli {
    /// Snippet length to capture (e.g., 8s, 15s)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,

    /// Time between recognition cycles in daemon mode (e.g., 5m, 90s)
    #[arg(short = 'i', long, value_name = "TIME", requires = "daemon")]
    pub interval: Option<String>,

    /// Recognition provider (audd, audd-stream)
    #[arg(short = 'r', long, value_name = "PROVIDER")]
    pub recognizer: Option<String>,

    /// Prompt generator (openai, anthropic, gemini, ollama)
    #[arg(short = 'g', long, value_name = "PROVIDER")]
    pub generator: Option<String>,

    /// OSC receiver host
    #[arg(long, value_name = "HOST")]
    pub osc_host: Option<String>,

    /// OSC receiver port
    #[arg(long, value_name = "PORT")]
    pub osc_port: Option<u16>,

    /// Print the result without sending it to the OSC receiver
    #[arg(long, conflicts_with = "daemon")]
    pub no_publish: bool,

    /// Run as daemon (control via: trackcast daemon start/stop/status)
    #[arg(long)]
    pub daemon: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Send commands to running daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

/// Daemon control actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DaemonAction {
    /// Resume scheduled recognition
    Start,
    /// Stop recognition (the daemon keeps running)
    Stop,
    /// Show daemon status
    Status,
    /// Send a test ping to the OSC receiver
    Ping,
    /// Send free text to the OSC receiver
    Manual {
        /// Text to send
        text: String,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "interval",
    "snippet_duration",
    "recognition.provider",
    "recognition.api_key",
    "generation.provider",
    "generation.api_key",
    "generation.model",
    "generation.base_url",
    "generation.instructions",
    "osc.host",
    "osc.port",
    "osc.listen_port",
    "osc.external_address",
];

pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

/// Keys whose values are masked on display
pub fn is_secret_key(key: &str) -> bool {
    key.ends_with("api_key")
}
