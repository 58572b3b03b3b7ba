//! CLI presenter for output formatting

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::OrchestratorStatus;
use crate::domain::track::Track;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Handle for updating the spinner from callbacks
    pub fn spinner_handle(&self) -> Option<ProgressBar> {
        self.spinner.clone()
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print an identified track and its prompts to stdout
    pub fn track(&self, track: &Track) {
        for line in format_track(track) {
            self.output(&line);
        }
    }

    /// Print daemon status
    pub fn daemon_status(&self, state: &str) {
        eprintln!("{} Daemon: {}", "●".cyan(), state);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-text lines describing a track
pub fn format_track(track: &Track) -> Vec<String> {
    let mut lines = vec![format!("{} - {}", track.artist, track.title)];

    let optional = [
        ("Album", track.album.clone()),
        ("Released", track.release_date.clone()),
        ("Genre", track.genre.clone()),
        ("BPM", track.bpm.map(|b| format!("{:.0}", b))),
        ("Artwork", track.artwork_url.clone()),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            lines.push(format!("  {}: {}", label, value));
        }
    }
    lines.push(format!(
        "  Energy: {}  Danceability: {}",
        track.energy_level(),
        track.danceability_level()
    ));

    for prompt in track.prompts().iter() {
        lines.push(format!("  [{}] {}", prompt.number, prompt.text));
    }
    lines
}

/// One-line daemon status: `state | next cycle in Ns | Artist - Title`
pub fn format_status_line(status: &OrchestratorStatus) -> String {
    let mut parts = vec![status.state.to_string()];
    if let Some(secs) = status.seconds_until_next {
        parts.push(format!("next cycle in {}s", secs));
    }
    if let Some(ref track) = status.current_track {
        parts.push(track.to_string());
    }
    parts.join(" | ")
}

/// Format a countdown as `m:ss`
pub fn format_countdown(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
