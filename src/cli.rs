//! CLI argument parsing for redfish-collector
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: redfish.yaml, env: REDFISH_CONFIG)
//! - `--interval`: Poll interval in seconds (overrides config file, env: REDFISH_INTERVAL)
//! - `--timeout`: HTTP timeout in milliseconds (overrides config file, env: REDFISH_TIMEOUT)
//! - `--insecure`: Skip TLS certificate verification (env: REDFISH_INSECURE)
//! - `--validate`: Load and resolve the configuration, then exit
//! - `--once`: Run a single polling cycle, wait for it and exit
//! - `--log-level` / `-l`: Log level (env: REDFISH_LOG_LEVEL)
//! - `--output-format`: Output format for `--validate` (text/json)
//!
//! # Precedence
//!
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

/// redfish-collector - Redfish metrics poller
///
/// Polls Redfish management APIs and writes one JSON metric record per line
/// to stdout.
#[derive(Parser, Debug)]
#[command(name = "redfish-collector")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "redfish.yaml",
        env = "REDFISH_CONFIG"
    )]
    pub config: PathBuf,

    /// Poll interval in seconds (overrides config file)
    #[arg(long, value_name = "SECS", env = "REDFISH_INTERVAL")]
    pub interval: Option<u64>,

    /// HTTP timeout in milliseconds (overrides config file)
    #[arg(long, value_name = "MS", env = "REDFISH_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long, env = "REDFISH_INSECURE")]
    pub insecure: bool,

    /// Validate configuration without polling
    #[arg(long, conflicts_with = "once")]
    pub validate: bool,

    /// Run one polling cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "REDFISH_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Output format for --validate
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Apply command-line overrides on top of file settings
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if self.insecure {
            config.verify_peer = false;
        }
    }
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Output format options for validate mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}
