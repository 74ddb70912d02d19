//! ledger-audit - offline auditor for consent ledger snapshots
//!
//! Loads an exported snapshot, rebuilds the ledger and prints the requested
//! derivation as JSON on stdout. Logs go to stderr.

mod args;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::fs;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consent_ledger::{ConsentLedger, LedgerConfig, LedgerSnapshot, MatchStatus};

use crate::args::{Args, Command};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ledger_audit={},consent_ledger={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(2);
    }

    let ledger = load_ledger(&args)?;

    match args.command {
        Command::Verify => {
            let report = ledger.verify();
            print_json(&report, args.pretty)?;
            if !report.valid {
                warn!("Snapshot failed integrity verification");
                std::process::exit(1);
            }
        }
        Command::Matches { failures_only } => {
            let matches: Vec<_> = ledger
                .check_all_actions()
                .into_iter()
                .filter(|m| !failures_only || m.status != MatchStatus::WithinBounds)
                .collect();
            print_json(&matches, args.pretty)?;
        }
        Command::Patterns => print_json(&ledger.detect_scope_creep(), args.pretty)?,
        Command::Stats => print_json(&ledger.stats(), args.pretty)?,
        Command::Report { skip_integrity } => {
            print_json(&ledger.report(!skip_integrity), args.pretty)?
        }
    }

    Ok(())
}

fn load_ledger(args: &Args) -> anyhow::Result<ConsentLedger> {
    let raw = fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let snapshot: LedgerSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("parsing snapshot {}", args.snapshot.display()))?;

    let config = match &args.config {
        Some(path) => LedgerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LedgerConfig::default(),
    };

    let ledger = ConsentLedger::import(snapshot)?.with_config(config);
    info!(
        principal_id = %ledger.principal_id(),
        authorisations = ledger.authorisations().len(),
        actions = ledger.actions().len(),
        "Loaded ledger"
    );
    Ok(ledger)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
