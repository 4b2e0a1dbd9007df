//! Command-line interface for postwatch using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Keyword and AI-assisted alerting on new Reddit submissions.
#[derive(Parser, Debug)]
#[command(name = "postwatch")]
#[command(version)]
#[command(about = "Keyword and AI-assisted alerting on new Reddit submissions")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(
        short = 'c',
        long = "config",
        default_value = DEFAULT_CONFIG_PATH,
        env = "POSTWATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Validate configuration and exit.
    #[arg(long = "validate", conflicts_with = "sample")]
    pub validate: bool,

    /// Run the built-in sample post through the pipeline and exit.
    #[arg(long = "sample")]
    pub sample: bool,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}
