//! CLI output formatting.
//!
//! Human-readable lines with colored symbols, or one JSON object per line
//! when `--json` is set. Quiet mode suppresses everything except warnings
//! and errors.

use std::fmt::Display;

use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};
use parking_lot::RwLock;
use serde_json::{json, Value};

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Emit machine-readable JSON output instead of human-readable text.
    pub json: bool,
    /// Suppress non-essential output.
    pub quiet: bool,
    /// Verbosity level (0 = normal, 1+ = increasingly verbose).
    pub verbose: u8,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool, verbose: u8) -> Self {
        Self {
            json,
            quiet,
            verbose,
        }
    }
}

static OUTPUT_CONFIG: RwLock<OutputConfig> = RwLock::new(OutputConfig::new(false, false, 0));

/// How a line behaves under `--quiet`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Priority {
    Regular,
    Always,
}

/// Print either the JSON line or the human line for one event.
fn emit(kind: &str, payload: Value, priority: Priority, human: impl FnOnce()) {
    let config = current();
    if config.json {
        println!("{}", json!({ "type": kind, "payload": payload }));
        return;
    }
    if config.quiet && priority == Priority::Regular {
        return;
    }
    human();
}

fn current() -> OutputConfig {
    *OUTPUT_CONFIG.read()
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig) {
    *OUTPUT_CONFIG.write() = config;
}

/// Force colors on or off; `None` leaves terminal detection in charge.
pub fn set_color(enabled: Option<bool>) {
    match enabled {
        Some(enabled) => owo_colors::set_override(enabled),
        None => owo_colors::unset_override(),
    }
}

#[must_use]
pub fn is_json() -> bool {
    current().json
}

#[must_use]
pub fn is_quiet() -> bool {
    current().quiet
}

/// Verbosity level from `-v` flags.
#[must_use]
pub fn verbosity() -> u8 {
    current().verbose
}

/// Print the application header with name and version.
pub fn header(version: &str) {
    emit(
        "header",
        json!({ "app": "dbload", "version": version }),
        Priority::Regular,
        || {
            println!(
                "{} {}",
                "dbload".if_supports_color(Stdout, |t| t.bold()),
                version.if_supports_color(Stdout, |t| t.dimmed())
            );
            println!();
        },
    );
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    let value = value.to_string();
    emit(
        "field",
        json!({ "label": label, "value": value }),
        Priority::Regular,
        || println!("  {:<14} {}", label.if_supports_color(Stdout, |t| t.dimmed()), value),
    );
}

pub fn success(message: &str) {
    emit(
        "success",
        json!({ "message": message }),
        Priority::Regular,
        || println!("  {} {}", "✓".if_supports_color(Stdout, |t| t.green()), message),
    );
}

pub fn warning(message: &str) {
    emit(
        "warning",
        json!({ "message": message }),
        Priority::Always,
        || println!("  {} {}", "⚠".if_supports_color(Stdout, |t| t.yellow()), message),
    );
}

/// Print an error line to stderr.
pub fn error(message: &str) {
    if is_json() {
        eprintln!(
            "{}",
            json!({ "type": "error", "payload": { "message": message } })
        );
        return;
    }
    eprintln!("  {} {}", "×".if_supports_color(Stderr, |t| t.red()), message);
}

pub fn section(title: &str) {
    emit(
        "section",
        json!({ "title": title }),
        Priority::Regular,
        || {
            println!();
            println!("{}", title.if_supports_color(Stdout, |t| t.bold()));
        },
    );
}

/// Print a dimmed note.
pub fn note(message: &str) {
    emit(
        "note",
        json!({ "message": message }),
        Priority::Regular,
        || println!("  {}", message.if_supports_color(Stdout, |t| t.dimmed())),
    );
}

/// Emit a JSON value directly (for commands with custom JSON output).
pub fn json_output(value: Value) {
    println!("{value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_updates_global_flags() {
        let before = current();
        configure(OutputConfig::new(false, true, 2));
        assert!(is_quiet());
        assert!(!is_json());
        assert_eq!(verbosity(), 2);
        configure(before);
    }
}
