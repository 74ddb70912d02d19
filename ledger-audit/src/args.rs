//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-audit")]
#[command(about = "Audit an exported agent consent ledger snapshot")]
pub struct Args {
    /// Snapshot file (JSON) produced by `ConsentLedger::export`
    pub snapshot: PathBuf,

    /// Ledger configuration file (YAML)
    #[arg(long, env = "LEDGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Pretty-print JSON output
    #[arg(long, default_value = "false")]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check both hash chains; exits non-zero if either is broken
    Verify,
    /// Match every action against its authorisation
    Matches {
        /// Only print matches that are not within bounds
        #[arg(long)]
        failures_only: bool,
    },
    /// Detect scope-creep patterns
    Patterns,
    /// Summary statistics
    Stats,
    /// Snapshot, matches, patterns and stats in one document
    Report {
        /// Leave out the chain integrity check
        #[arg(long)]
        skip_integrity: bool,
    },
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.snapshot.is_file() {
            return Err(format!(
                "Snapshot file not found: {}",
                self.snapshot.display()
            ));
        }

        if let Some(config) = &self.config {
            if !config.is_file() {
                return Err(format!("Config file not found: {}", config.display()));
            }
        }

        Ok(())
    }
}
