//! Command-line interface definitions.
//!
//! Defines the CLI structure for failwatch using `clap`: `run` drives a
//! measurement, `check` verifies that every configured path is reachable,
//! and `config validate` checks a configuration file without connecting.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::RunMode;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "failwatch.toml";

/// Measure database failover downtime, direct connection versus proxy
#[derive(Parser, Debug)]
#[command(name = "failwatch")]
#[command(version)]
pub struct Cli {
    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a failover measurement (start the failover while it runs)
    Run(Box<RunArgs>),

    /// Open one connection per configured path and ping it
    Check(ConfigPathArg),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file for correctness.
    Validate(ConfigPathArg),
}

/// Shared argument struct for commands that only need a configuration path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

/// Which access paths to exercise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Direct,
    Proxied,
    #[default]
    Both,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Direct => Self::Direct,
            ModeArg::Proxied => Self::Proxied,
            ModeArg::Both => Self::Both,
        }
    }
}

/// A load-generator output file bound to an access path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadInput {
    pub path: String,
    pub file: PathBuf,
}

fn parse_load_input(raw: &str) -> Result<LoadInput, String> {
    let (path, file) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=FILE, got '{raw}'"))?;
    if path.is_empty() || file.is_empty() {
        return Err(format!("expected PATH=FILE, got '{raw}'"));
    }
    Ok(LoadInput {
        path: path.to_string(),
        file: PathBuf::from(file),
    })
}

/// Arguments for the `run` subcommand.
///
/// Flags override the matching configuration values.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Access paths to exercise.
    #[arg(long, value_enum, default_value = "both")]
    pub mode: ModeArg,

    /// Measured duration in seconds.
    #[arg(long)]
    pub duration: Option<u64>,

    /// Warm-up seconds before recording starts.
    #[arg(long)]
    pub warmup: Option<u64>,

    /// Seed for reproducible operation draws.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable the connect-and-ping probe on every path.
    #[arg(long)]
    pub probe: bool,

    /// Write the final report as JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// pgbench output to fold into a path's report (repeatable).
    #[arg(long = "load-input", value_name = "PATH=FILE", value_parser = parse_load_input)]
    pub load_inputs: Vec<LoadInput>,

    /// Log level override (e.g. debug, info, warn).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,
}
