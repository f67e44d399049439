//! Command-line interface for the gateway binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "intervued",
    version,
    about = "Ephemeral AI interview session gateway"
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "intervue.toml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway (the default when no subcommand is given).
    Serve,
    /// Inspect or validate the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Check the config file and report issues.
    Validate,
    /// Print the effective configuration as TOML.
    Show,
}
