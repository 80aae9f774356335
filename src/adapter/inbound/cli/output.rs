//! Astral-style CLI output formatting.
//!
//! Consistent terminal output with support for JSON mode (for scripting),
//! quiet mode, and verbosity levels. Colors go through owo-colors'
//! `if_supports_color`, so `--color` and terminal detection decide whether
//! escapes are written.

use std::fmt::Display;
use std::sync::OnceLock;

use owo_colors::{OwoColorize, Stream};
use parking_lot::RwLock;
use serde_json::json;

use super::command::ColorChoice;

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
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

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    *config_cell().read()
}

/// Route one message: a `{type, payload}` JSON line in JSON mode, otherwise
/// `human`, unless quiet mode hides it. Warnings and errors pass `always`.
fn emit(kind: &str, payload: serde_json::Value, always: bool, human: impl FnOnce()) {
    let config = read_config();
    if config.json {
        println!("{}", json!({ "type": kind, "payload": payload }));
    } else if always || !config.quiet {
        human();
    }
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig, color: ColorChoice) {
    *config_cell().write() = config;
    match color {
        ColorChoice::Auto => owo_colors::unset_override(),
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
    }
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

/// Return the global verbosity level from `-v` flags.
#[must_use]
pub fn verbosity() -> u8 {
    read_config().verbose
}

/// Print the application header with name and version.
pub fn header(version: &str) {
    emit(
        "header",
        json!({ "app": "failwatch", "version": version }),
        false,
        || {
            println!(
                "{} {}",
                "failwatch".if_supports_color(Stream::Stdout, |s| s.bold()),
                version.if_supports_color(Stream::Stdout, |s| s.dimmed())
            );
            println!();
        },
    );
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    let value = value.to_string();
    emit("field", json!({ "label": label, "value": value }), false, || {
        println!(
            "  {:<14} {value}",
            label.if_supports_color(Stream::Stdout, |s| s.dimmed())
        );
    });
}

pub fn success(message: &str) {
    emit("success", json!({ "message": message }), false, || {
        println!("  {} {message}", "✓".if_supports_color(Stream::Stdout, |s| s.green()));
    });
}

pub fn warning(message: &str) {
    emit("warning", json!({ "message": message }), true, || {
        println!("  {} {message}", "⚠".if_supports_color(Stream::Stdout, |s| s.yellow()));
    });
}

/// Print an error to stderr, as a JSON line in JSON mode.
pub fn error(message: &str) {
    if is_json() {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
    } else {
        eprintln!("  {} {message}", "×".if_supports_color(Stream::Stderr, |s| s.red()));
    }
}

pub fn section(title: &str) {
    emit("section", json!({ "title": title }), false, || {
        println!();
        println!("{}", title.if_supports_color(Stream::Stdout, |s| s.bold()));
    });
}

pub fn note(message: &str) {
    emit("note", json!({ "message": message }), false, || {
        println!("  {}", message.if_supports_color(Stream::Stdout, |s| s.dimmed()));
    });
}

/// Print a hint with a `hint:` prefix.
pub fn hint(message: &str) {
    emit("hint", json!({ "message": message }), false, || {
        println!(
            "  {}: {}",
            "hint".if_supports_color(Stream::Stdout, |s| s.cyan()),
            message.if_supports_color(Stream::Stdout, |s| s.dimmed())
        );
    });
}

/// Print pre-rendered content (tables, interval lists), indented.
pub fn lines(content: &str) {
    emit("lines", json!({ "content": content }), false, || {
        for line in content.lines() {
            println!("  {line}");
        }
    });
}

/// Emit a JSON value directly (for commands with their own JSON shape).
pub fn json_output(value: &serde_json::Value) {
    println!("{value}");
}

fn paint(value: impl Display, style: impl FnOnce(&String) -> String) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    style(&value)
}

/// Green, for good news.
pub fn positive(value: impl Display) -> String {
    paint(value, |v| v.if_supports_color(Stream::Stdout, |s| s.green()).to_string())
}

/// Red, for bad news.
pub fn negative(value: impl Display) -> String {
    paint(value, |v| v.if_supports_color(Stream::Stdout, |s| s.red()).to_string())
}

pub fn highlight(value: impl Display) -> String {
    paint(value, |v| v.if_supports_color(Stream::Stdout, |s| s.cyan()).to_string())
}
