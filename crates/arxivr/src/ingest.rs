//! The pipeline orchestrator.
//!
//! Drives each record through: page fetch → scrape → metadata → document
//! download → upload → ledger write, skipping early when the accession is
//! already in the ledger (or, optionally, when the remote item already
//! exists). A record that fails at any later stage is logged and counted;
//! it never aborts the run, and the ledger is left untouched so the
//! record is retried on a future run.
//!
//! Two scheduling modes share the same per-record contract: a strictly
//! ordered sequential loop, and a bounded worker pool whose per-task
//! results are all collected and aggregated into the run report.

use reqwest::StatusCode;
use tokio::task::JoinSet;

use super::*;
use crate::{
  archive::{ArchiveClient, UploadFile},
  config::IngestConfig,
  ledger::Ledger,
  medline::{MedlineRecord, RecordReader},
  metadata::ItemMetadata,
};

/// What happened to a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// Uploaded and recorded in the ledger.
  Archived {
    /// Identifier of the created archive item.
    identifier: String,
  },
  /// The ledger already lists this accession.
  AlreadyArchived,
  /// The remote item already exists (only with the existence check on).
  ItemExists,
}

/// Aggregated result of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
  /// Records uploaded and recorded this run.
  pub archived: usize,
  /// Records skipped because they were already archived.
  pub skipped:  usize,
  /// Records that failed at some pipeline stage.
  pub failed:   usize,
}

impl RunReport {
  /// Total records this run looked at.
  pub fn processed(&self) -> usize { self.archived + self.skipped + self.failed }

  /// Folds one record's result into the report.
  fn tally(&mut self, result: Result<Outcome>) {
    match result {
      Ok(Outcome::Archived { .. }) => self.archived += 1,
      Ok(Outcome::AlreadyArchived | Outcome::ItemExists) => self.skipped += 1,
      Err(e) => {
        error!("record failed: {e}");
        self.failed += 1;
      },
    }
  }
}

/// The ingestion pipeline.
///
/// Cloning is cheap: the HTTP client, archive client, and ledger handle
/// all share their underlying connections, which is how one `Ingest` is
/// handed to every worker task.
#[derive(Clone)]
pub struct Ingest {
  /// Pipeline configuration.
  config:  IngestConfig,
  /// HTTP client shared by page fetches and downloads.
  http:    reqwest::Client,
  /// Archive upload client.
  archive: ArchiveClient,
  /// Ledger of already-archived accessions.
  ledger:  Ledger,
}

impl Ingest {
  /// Builds a pipeline from a validated configuration, opening the
  /// ledger.
  ///
  /// # Errors
  ///
  /// Returns an error when the configuration is invalid or the ledger
  /// cannot be opened.
  pub async fn new(config: IngestConfig) -> Result<Self> {
    config.validate()?;
    let ledger = Ledger::open(&config.ledger_path).await?;
    let http = reqwest::Client::new();
    let archive = ArchiveClient::new(http.clone(), &config);
    Ok(Self { config, http, archive, ledger })
  }

  /// Runs the pipeline over the configured records file.
  ///
  /// # Errors
  ///
  /// Returns an error when the records file cannot be opened; per-record
  /// failures are aggregated into the report instead.
  pub async fn run(&self) -> Result<RunReport> {
    let records = RecordReader::from_path(&self.config.records_path)?;
    if self.config.workers <= 1 {
      self.run_sequential(records).await
    } else {
      self.run_pooled(records).await
    }
  }

  /// Strictly ordered mode: one record at a time.
  async fn run_sequential(
    &self,
    records: impl Iterator<Item = Result<MedlineRecord>>,
  ) -> Result<RunReport> {
    let mut report = RunReport::default();

    for (index, record) in records.enumerate() {
      if self.config.record_limit.is_some_and(|limit| index >= limit) {
        info!("record limit reached after {index} records");
        break;
      }
      match record {
        Ok(record) => report.tally(self.process(record).await),
        Err(e) => report.tally(Err(e)),
      }
    }

    Ok(report)
  }

  /// Bounded worker pool mode.
  ///
  /// At most `workers` records are in flight; every task is awaited and
  /// its result folded into the report, so worker failures are never
  /// dropped on the floor.
  async fn run_pooled(
    &self,
    records: impl Iterator<Item = Result<MedlineRecord>>,
  ) -> Result<RunReport> {
    let mut report = RunReport::default();
    let mut tasks: JoinSet<Result<Outcome>> = JoinSet::new();

    for (index, record) in records.enumerate() {
      if self.config.record_limit.is_some_and(|limit| index >= limit) {
        info!("record limit reached after {index} records");
        break;
      }
      let record = match record {
        Ok(record) => record,
        Err(e) => {
          report.tally(Err(e));
          continue;
        },
      };

      if tasks.len() >= self.config.workers {
        if let Some(joined) = tasks.join_next().await {
          report.tally(flatten(joined));
        }
      }

      let worker = self.clone();
      tasks.spawn(async move { worker.process(record).await });
    }

    while let Some(joined) = tasks.join_next().await {
      report.tally(flatten(joined));
    }

    Ok(report)
  }

  /// Ledger filter plus the full per-record pipeline.
  async fn process(&self, record: MedlineRecord) -> Result<Outcome> {
    let pmc = record.pmc()?;
    if self.ledger.contains(pmc).await? {
      info!("skipping, already exists: pubmed-{pmc}");
      return Ok(Outcome::AlreadyArchived);
    }
    self.archive_article(record).await
  }

  /// Archives one record end to end.
  ///
  /// # Errors
  ///
  /// Any stage failure comes back as an error for the caller to tally;
  /// the ledger is written only after every uploaded file reported
  /// HTTP 200.
  pub async fn archive_article(&self, record: MedlineRecord) -> Result<Outcome> {
    let pmc = record.pmc()?.to_owned();

    let page_url = scrape::article_url(&self.config.base_url, &pmc)?;
    let page = scrape::fetch_article_page(&self.http, &page_url).await?;

    let metadata = ItemMetadata::from_record(&record, Some(&page), &self.config.base_url)?;
    let identifier = metadata.identifier().to_owned();

    if self.config.check_remote_item && self.archive.item_exists(&identifier).await? {
      info!("skipping, already exists: {identifier}");
      return Ok(Outcome::ItemExists);
    }

    let doi = record.doi_or_pii();
    let Some(document_url) =
      fetch::resolve_document_url(&self.config.base_url, &pmc, doi.as_deref(), &page)
    else {
      error!("skipping, cannot resolve a document link: {pmc}");
      return Err(ArxivrError::UnresolvableDocument(pmc));
    };

    // Staged files live only as long as this record's processing.
    let staging = tempfile::tempdir()?;
    let document = fetch::download(&self.http, &document_url, &pmc, staging.path()).await?;

    let record_filename = format!("{identifier}_medline.json");
    let record_path = staging.path().join(&record_filename);
    tokio::fs::write(&record_path, serde_json::to_vec(&record)?).await?;

    let files = [
      UploadFile { path: document.path, filename: document.filename },
      UploadFile { path: record_path, filename: record_filename },
    ];
    let statuses = self.archive.upload(&identifier, &files, &metadata).await?;
    if !statuses.iter().all(|status| *status == StatusCode::OK) {
      error!("not archived: {identifier}");
      return Err(ArxivrError::UploadRejected {
        identifier,
        statuses: statuses.iter().map(|status| status.as_u16()).collect(),
      });
    }

    self.ledger.record(&pmc, Utc::now()).await?;
    info!("successfully archived: {identifier}");
    Ok(Outcome::Archived { identifier })
  }
}

/// Maps a join result onto the per-record result space.
fn flatten(joined: std::result::Result<Result<Outcome>, tokio::task::JoinError>) -> Result<Outcome> {
  match joined {
    Ok(result) => result,
    Err(e) => Err(e.into()),
  }
}
