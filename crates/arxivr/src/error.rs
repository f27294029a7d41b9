//! Error types for the arxivr library.
//!
//! This module provides a single error type covering every failure mode in
//! the ingestion pipeline:
//! - Network errors while fetching pages, documents, or talking to the
//!   archive service
//! - Ledger (SQLite) operations
//! - Record parsing and field validation
//! - File system operations during download staging
//!
//! # Examples
//!
//! ```
//! use arxivr::error::ArxivrError;
//!
//! fn describe(err: &ArxivrError) {
//!   match err {
//!     ArxivrError::MissingAccession => println!("record has no PMC field"),
//!     ArxivrError::Network(e) => println!("network error: {}", e),
//!     e => println!("other error: {}", e),
//!   }
//! }
//! ```

use thiserror::Error;

/// Error type alias used for the [`arxivr`](crate) crate.
pub type Result<T> = core::result::Result<T, ArxivrError>;

/// Errors that can occur while ingesting records into the archive.
///
/// Most variants wrap an underlying library error transparently; the
/// remaining variants carry enough context to identify the record or URL
/// that failed.
#[derive(Error, Debug)]
pub enum ArxivrError {
  /// A record has no usable `PMC` accession.
  ///
  /// Every archive item identifier is derived from the PMC accession, so a
  /// record without one cannot be processed at all.
  #[error("Record is missing a PMC accession")]
  MissingAccession,

  /// A MEDLINE line could not be interpreted.
  ///
  /// Carries the offending line for debugging. This occurs when a line is
  /// neither a `TAG - value` field, a six-space continuation, nor blank.
  #[error("Malformed MEDLINE line: {0:?}")]
  MalformedRecord(String),

  /// A network request failed.
  ///
  /// This can occur when:
  /// - The network is unavailable
  /// - The server is unreachable
  /// - The request times out
  /// - TLS errors occur
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// No PDF or EPUB could be retrieved for a record.
  ///
  /// Both the primary download and the EPUB fallback returned a
  /// non-success status. The record is skipped, not the run.
  #[error("No document available for {accession} (last status {status})")]
  DocumentUnavailable {
    /// PMC accession of the record being processed.
    accession: String,
    /// HTTP status of the final download attempt.
    status:    u16,
  },

  /// Neither a direct document URL nor a scraped page link was resolvable.
  #[error("Cannot resolve a document URL for {0}")]
  UnresolvableDocument(String),

  /// The archive service rejected one or more uploaded files.
  ///
  /// Success requires every per-file response to report HTTP 200; any
  /// other status fails the whole archive operation for that record.
  #[error("Upload rejected for {identifier}: statuses {statuses:?}")]
  UploadRejected {
    /// Identifier of the archive item that was being uploaded.
    identifier: String,
    /// Status code of every per-file response.
    statuses:   Vec<u16>,
  },

  /// A SQLite operation failed.
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  /// An async SQLite operation failed.
  ///
  /// This wraps errors from the `tokio-rusqlite` connection actor.
  #[error(transparent)]
  AsyncSqlite(#[from] tokio_rusqlite::Error),

  /// A worker task panicked or was cancelled before completing.
  #[error(transparent)]
  Join(#[from] tokio::task::JoinError),

  /// A file system operation failed.
  ///
  /// This occurs when staging a download to disk or reading the records
  /// file fails.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// Serializing a record to JSON failed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// A URL could not be parsed or joined.
  #[error(transparent)]
  UrlParse(#[from] url::ParseError),

  /// Invalid configuration with a human-readable explanation.
  #[error("{0}")]
  Config(String),
}
