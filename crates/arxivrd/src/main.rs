//! Command line driver for the arxivr ingestion pipeline.
//!
//! Reads a MEDLINE records file and archives every record that is not
//! already in the local ledger:
//!
//! ```bash
//! # Ingest with the defaults (4 workers, no record cap)
//! arxivrd pmc_results.txt
//!
//! # Strictly ordered dry of the first 100 records, like the original batch
//! arxivrd pmc_results.txt --workers 1 --limit 100
//!
//! # Load endpoints and credentials from a TOML config
//! arxivrd pmc_results.txt --config arxivr.toml
//! ```
//!
//! Log output goes to the console and to `arxivr.log` in the log
//! directory; `-v`/`-vv` raise the verbosity.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use arxivr::{config::IngestConfig, ingest::Ingest};
use clap::{builder::ArgAction, Parser};
use console::style;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod error;

use crate::error::*;

/// Prefix for information messages
static INFO_PREFIX: &str = "ℹ ";
/// Prefix for success messages
static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for warning messages
static WARNING_PREFIX: &str = "⚠️ ";

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Ingest MEDLINE records into a remote archive")]
pub struct Cli {
  /// MEDLINE records file to ingest
  records_file: PathBuf,

  /// Verbose mode (-v, -vv) for different levels of logging detail
  #[arg(short, long, action = ArgAction::Count, help = "Increase logging verbosity")]
  verbose: u8,

  /// Path to a TOML configuration file; flags below override its values
  #[arg(long, short)]
  config: Option<PathBuf>,

  /// Path to the ledger database file
  #[arg(long)]
  ledger: Option<PathBuf>,

  /// Worker count; 1 selects the strictly ordered sequential mode
  #[arg(long, short)]
  workers: Option<usize>,

  /// Stop after this many records from the input
  #[arg(long, short = 'n')]
  limit: Option<usize>,

  /// Probe the archive for an existing item before uploading
  #[arg(long)]
  check_remote: bool,

  /// Directory for the persistent log file
  #[arg(long, default_value = ".")]
  log_dir: PathBuf,
}

/// Configures dual console + file logging based on the verbosity level.
///
/// The returned guard must stay alive for the duration of the program or
/// buffered log lines are lost.
fn setup_logging(verbosity: u8, log_dir: &Path) -> WorkerGuard {
  let filter = match verbosity {
    0 => "info",
    1 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let file_appender = tracing_appender::rolling::never(log_dir, "arxivr.log");
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
    .init();

  guard
}

/// Merges the CLI flags over the loaded (or default) configuration.
fn build_config(cli: &Cli) -> Result<IngestConfig> {
  let mut config = match &cli.config {
    Some(path) => IngestConfig::from_path(path)?,
    None => IngestConfig::default(),
  };

  config.records_path = cli.records_file.clone();
  if let Some(ledger) = &cli.ledger {
    config.ledger_path = ledger.clone();
  }
  if let Some(workers) = cli.workers {
    config.workers = workers;
  }
  if let Some(limit) = cli.limit {
    config.record_limit = Some(limit);
  }
  if cli.check_remote {
    config.check_remote_item = true;
  }

  Ok(config)
}

/// Entry point for the arxivrd CLI application.
///
/// # Errors
///
/// Returns an [`ArxivrdError`] when the configuration is unusable or the
/// records file cannot be opened; per-record failures are reported in the
/// summary instead.
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let _guard = setup_logging(cli.verbose, &cli.log_dir);

  let config = build_config(&cli)?;

  println!(
    "{} Ingesting records from {}",
    style(INFO_PREFIX).cyan(),
    style(cli.records_file.display()).yellow()
  );

  let ingest = Ingest::new(config).await?;
  let report = ingest.run().await?;
  info!(
    "run complete: {} archived, {} skipped, {} failed",
    report.archived, report.skipped, report.failed
  );

  if report.failed == 0 {
    println!(
      "{} Archived {}, skipped {} already done",
      style(SUCCESS_PREFIX).green(),
      style(report.archived).yellow(),
      style(report.skipped).yellow()
    );
  } else {
    println!(
      "{} Archived {}, skipped {}, {} failed (details in arxivr.log)",
      style(WARNING_PREFIX).yellow(),
      style(report.archived).yellow(),
      style(report.skipped).yellow(),
      style(report.failed).red()
    );
  }

  Ok(())
}
