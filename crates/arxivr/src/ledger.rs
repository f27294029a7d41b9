//! Local SQLite ledger of already-archived accessions.
//!
//! The ledger answers one question ("do we have it?") and records one
//! fact: an accession was archived at some timestamp. A record whose
//! accession is present in the ledger is never processed again.
//!
//! All access goes through a `tokio-rusqlite` connection, whose background
//! thread serializes reads and writes. Concurrent pipeline workers share a
//! clone of the handle and cannot race on the table.
//!
//! # Examples
//!
//! ```no_run
//! # use arxivr::ledger::Ledger;
//! # use chrono::Utc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::open("dowehaveit.sqlite").await?;
//!
//! if !ledger.contains("PMC3817617").await? {
//!   // ... archive the article ...
//!   ledger.record("PMC3817617", Utc::now()).await?;
//! }
//! # Ok(())
//! # }
//! ```

use rusqlite::params;
use tokio_rusqlite::Connection;

use super::*;

/// Handle for the archived-accessions ledger.
///
/// Cloning is cheap and shares the same underlying connection actor, so a
/// single `Ledger` can be handed to every pipeline worker.
#[derive(Clone)]
pub struct Ledger {
  /// Async SQLite connection handle.
  conn: Connection,
}

impl Ledger {
  /// Opens an existing ledger or creates a new one at the specified path.
  ///
  /// The parent directory is created if needed and the schema is
  /// initialized from the bundled migration.
  ///
  /// # Errors
  ///
  /// Returns an error when the file cannot be created or the schema
  /// initialization fails.
  ///
  /// # Examples
  ///
  /// ```no_run
  /// # use arxivr::ledger::Ledger;
  /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
  /// let ledger = Ledger::open(Ledger::default_path()).await?;
  /// # Ok(())
  /// # }
  /// ```
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    if let Some(parent) = path.as_ref().parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }
    let conn = Connection::open(path.as_ref()).await?;

    // Initialize schema
    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(
          env!("CARGO_MANIFEST_DIR"),
          "/migrations/init.sql"
        )))?;
        Ok(())
      })
      .await?;

    Ok(Self { conn })
  }

  /// Returns the default path for the ledger file.
  ///
  /// The path is constructed as follows:
  /// - On Unix: `~/.local/share/arxivr/dowehaveit.sqlite`
  /// - On macOS: `~/Library/Application Support/arxivr/dowehaveit.sqlite`
  /// - On Windows: `%APPDATA%\arxivr\dowehaveit.sqlite`
  /// - Fallback: `./dowehaveit.sqlite` in the current directory
  pub fn default_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("arxivr").join("dowehaveit.sqlite")
  }

  /// True when `pmc` has already been archived.
  ///
  /// # Errors
  ///
  /// Returns an error when the lookup itself fails; a missing row is
  /// `Ok(false)`, not an error.
  pub async fn contains(&self, pmc: &str) -> Result<bool> {
    let pmc = pmc.to_owned();
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached("SELECT 1 FROM archived WHERE pmc = ?1")?;
        let result = stmt.query_row([pmc], |_| Ok(()));

        match result {
          Ok(()) => Ok(true),
          Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await
      .map_err(ArxivrError::from)
  }

  /// Upserts the ledger entry for `pmc` with the given timestamp.
  ///
  /// Called only after a fully successful upload; re-recording an
  /// accession refreshes its timestamp.
  ///
  /// # Errors
  ///
  /// Returns an error when the write fails.
  pub async fn record(&self, pmc: &str, last_modified: DateTime<Utc>) -> Result<()> {
    let pmc = pmc.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO archived (pmc, last_modified) VALUES (?1, ?2)
             ON CONFLICT(pmc) DO UPDATE SET last_modified = excluded.last_modified",
          params![pmc, last_modified],
        )?;
        Ok(())
      })
      .await
      .map_err(ArxivrError::from)
  }
}

#[cfg(test)]
mod tests {

  use super::*;

  /// Helper function to set up a test ledger
  async fn setup_test_ledger() -> (Ledger, PathBuf, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sqlite");
    let ledger = Ledger::open(&path).await.unwrap();
    (ledger, path, dir)
  }

  #[traced_test]
  #[tokio::test]
  async fn test_ledger_creation() {
    let (_ledger, path, _dir) = setup_test_ledger().await;

    assert!(path.exists());
  }

  #[traced_test]
  #[tokio::test]
  async fn test_unknown_accession_is_absent() {
    let (ledger, _path, _dir) = setup_test_ledger().await;

    assert!(!ledger.contains("PMC123").await.unwrap());
  }

  #[traced_test]
  #[tokio::test]
  async fn test_record_then_contains() {
    let (ledger, _path, _dir) = setup_test_ledger().await;

    ledger.record("PMC123", Utc::now()).await.unwrap();
    assert!(ledger.contains("PMC123").await.unwrap());
    assert!(!ledger.contains("PMC999").await.unwrap());
  }

  #[traced_test]
  #[tokio::test]
  async fn test_record_is_an_upsert() {
    let (ledger, _path, _dir) = setup_test_ledger().await;

    ledger.record("PMC123", Utc::now()).await.unwrap();
    ledger.record("PMC123", Utc::now()).await.unwrap();
    assert!(ledger.contains("PMC123").await.unwrap());
  }

  #[traced_test]
  #[tokio::test]
  async fn test_entries_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sqlite");

    {
      let ledger = Ledger::open(&path).await.unwrap();
      ledger.record("PMC3817617", Utc::now()).await.unwrap();
    }

    {
      let ledger = Ledger::open(&path).await.unwrap();
      assert!(ledger.contains("PMC3817617").await.unwrap());
    }
  }
}
