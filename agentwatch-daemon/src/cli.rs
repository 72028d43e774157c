//! CLI argument definitions for the agentwatch daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use agentwatch_core::config::{AgentwatchConfig, CONFIG_PATH_ENV};
use clap::Parser;

/// Security monitor for a conversational agent.
///
/// Tails the agent's transcripts, alerts the operator over Telegram and
/// accepts remote commands to mute alerts or stop the agent.
#[derive(Parser, Debug)]
#[command(name = "agentwatch")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to agentwatch.toml.
    ///
    /// Falls back to `$AGENTWATCH_CONFIG`, then
    /// `~/.config/agentwatch/agentwatch.toml`.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Resolves the configuration file path.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => AgentwatchConfig::default_path(),
        }
    }

    /// Applies the logging overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut AgentwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
