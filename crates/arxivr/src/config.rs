//! Explicit pipeline configuration.
//!
//! Every knob lives in [`IngestConfig`]: there is no global state and no
//! configuration read at import time. A config can be built in code,
//! loaded from a TOML file, or left entirely at defaults.
//!
//! The knobs the two historical ingest scripts disagreed on (whether to
//! probe the remote item before uploading, and the upload retry policy)
//! are ordinary fields here rather than behavioral forks.
//!
//! # Examples
//!
//! ```
//! use arxivr::config::IngestConfig;
//!
//! let config = IngestConfig { workers: 1, record_limit: Some(100), ..Default::default() };
//! assert_eq!(config.base_url.as_str(), "http://www.ncbi.nlm.nih.gov/");
//! ```

use super::*;

/// Publisher serving the article pages and documents.
const DEFAULT_BASE_URL: &str = "http://www.ncbi.nlm.nih.gov";
/// S3-style upload endpoint of the archive service.
const DEFAULT_UPLOAD_ENDPOINT: &str = "https://s3.us.archive.org";
/// Read-only item metadata endpoint of the archive service.
const DEFAULT_METADATA_ENDPOINT: &str = "https://archive.org/metadata/";

/// Configuration for one ingestion run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  /// MEDLINE records file to ingest.
  pub records_path:      PathBuf,
  /// Where the archived-accessions ledger lives.
  pub ledger_path:       PathBuf,
  /// Publisher base URL for article pages and direct document URLs.
  pub base_url:          Url,
  /// Archive upload endpoint.
  pub upload_endpoint:   Url,
  /// Archive item metadata endpoint, used by the remote existence check.
  pub metadata_endpoint: Url,
  /// Archive access key; uploads are unauthenticated when unset.
  pub access_key:        Option<String>,
  /// Archive secret key.
  pub secret_key:        Option<String>,
  /// Worker count; `1` selects the strictly ordered sequential mode.
  pub workers:           usize,
  /// Stop after this many records from the input stream.
  pub record_limit:      Option<usize>,
  /// Per-file upload retry count.
  pub upload_retries:    u32,
  /// Fixed sleep between upload retries, in seconds.
  pub retry_sleep_secs:  u64,
  /// Probe the archive for an existing item before uploading.
  pub check_remote_item: bool,
  /// Let the archive queue derivative generation for uploaded files.
  pub queue_derive:      bool,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      records_path:      PathBuf::from("pmc_results.txt"),
      ledger_path:       ledger::Ledger::default_path(),
      base_url:          Url::parse(DEFAULT_BASE_URL).unwrap(),
      upload_endpoint:   Url::parse(DEFAULT_UPLOAD_ENDPOINT).unwrap(),
      metadata_endpoint: Url::parse(DEFAULT_METADATA_ENDPOINT).unwrap(),
      access_key:        None,
      secret_key:        None,
      workers:           4,
      record_limit:      None,
      upload_retries:    100,
      retry_sleep_secs:  20,
      check_remote_item: false,
      queue_derive:      false,
    }
  }
}

impl IngestConfig {
  /// Loads a configuration from a TOML file, filling unset fields with
  /// defaults.
  ///
  /// # Errors
  ///
  /// Returns an error when the file cannot be read or parsed.
  ///
  /// # Examples
  ///
  /// ```no_run
  /// # use arxivr::config::IngestConfig;
  /// let config = IngestConfig::from_path("arxivr.toml")?;
  /// # Ok::<(), arxivr::error::ArxivrError>(())
  /// ```
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
  }

  /// Checks invariants that cannot be expressed in the type.
  ///
  /// # Errors
  ///
  /// Returns [`ArxivrError::Config`] when the worker count is zero or
  /// only one of the two credential halves is set.
  pub fn validate(&self) -> Result<()> {
    if self.workers == 0 {
      return Err(ArxivrError::Config("worker count must be at least one".to_owned()));
    }
    if self.access_key.is_some() != self.secret_key.is_some() {
      return Err(ArxivrError::Config(
        "access_key and secret_key must be set together".to_owned(),
      ));
    }
    Ok(())
  }
}
