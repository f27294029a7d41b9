//! Batch ingestion of PubMed Central articles into a remote digital archive.
//!
//! `arxivr` reads MEDLINE-formatted bibliographic records and, for each record
//! not yet archived, it:
//!
//! - scrapes the article's publisher page for a download link and a
//!   contributor note
//! - derives a flat archival metadata mapping from the record fields
//! - downloads the article body (PDF, falling back to EPUB)
//! - uploads the document and the raw record (as JSON) to an archive item
//! - marks the accession as done in a local SQLite ledger
//!
//! # Getting Started
//!
//! ```no_run
//! use arxivr::{config::IngestConfig, ingest::Ingest, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!   let config = IngestConfig { records_path: "pmc_results.txt".into(), ..Default::default() };
//!
//!   let ingest = Ingest::new(config).await?;
//!   let report = ingest.run().await?;
//!   println!("archived {} articles", report.archived);
//!
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`medline`]: MEDLINE record parsing
//! - [`ledger`]: local ledger of already-archived accessions
//! - [`scrape`]: publisher article-page scraping
//! - [`metadata`]: archival metadata derivation
//! - [`fetch`]: document URL resolution and streamed download
//! - [`archive`]: remote archive-item upload client
//! - [`ingest`]: the pipeline orchestrator
//! - [`config`]: explicit pipeline configuration
//! - [`prelude`]: common traits and types for ergonomic imports

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod ledger;
pub mod medline;
pub mod metadata;
pub mod scrape;

use crate::error::*;

/// Common traits and types for ergonomic imports.
///
/// # Usage
///
/// ```no_run
/// use arxivr::{ledger::Ledger, prelude::*};
///
/// async fn example() -> std::result::Result<(), ArxivrError> {
///   let ledger = Ledger::open(Ledger::default_path()).await?;
///   Ok(())
/// }
/// ```
pub mod prelude {
  pub use crate::error::{ArxivrError, Result};
}
