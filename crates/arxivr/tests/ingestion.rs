//! Offline workflow tests for the ingestion building blocks.
//!
//! These exercise the pieces end to end on local files: records file →
//! parsed records → derived metadata → document URL, plus the ledger
//! round trip. Nothing here touches the network.

use std::io::Write;

use arxivr::{
  fetch::resolve_document_url,
  ledger::Ledger,
  medline::RecordReader,
  metadata::ItemMetadata,
  prelude::*,
  scrape::ArticlePage,
};
use chrono::Utc;
use tempfile::tempdir;
use tracing_test::traced_test;
use url::Url;

const RECORDS: &str = "PMID- 24229398\n\
                       PMC - PMC3817617\n\
                       TI  - A longitudinal study of something\n      important.\n\
                       FAU - Researcher, Alice\n\
                       JT  - Virology\n\
                       VI  - 12\n\
                       AB  - We measured a thing.\n\
                       AID - 10.1234/x.doi [doi]\n\
                       DEP - 20140102\n\
                       \n\
                       PMC - PMC999\n\
                       TI  - A record with no identifiers\n\
                       \n";

fn base() -> Url { Url::parse("http://www.ncbi.nlm.nih.gov").unwrap() }

#[test]
fn records_file_to_metadata_and_document_url() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let path = dir.path().join("records.txt");
  let mut file = std::fs::File::create(&path)?;
  file.write_all(RECORDS.as_bytes())?;

  let records: Vec<_> = RecordReader::from_path(&path)?.collect::<Result<Vec<_>>>()?;
  assert_eq!(records.len(), 2);

  let md = ItemMetadata::from_record(&records[0], None, &base())?;
  assert_eq!(md.identifier(), "pubmed-PMC3817617");
  assert_eq!(md.single("date"), Some("2014-01-02"));
  assert_eq!(md.single("title"), Some("A longitudinal study of something important."));

  let url = resolve_document_url(
    &base(),
    records[0].pmc()?,
    records[0].doi_or_pii().as_deref(),
    &ArticlePage::default(),
  );
  assert_eq!(
    url.unwrap().as_str(),
    "http://www.ncbi.nlm.nih.gov/pmc/articles/PMC3817617/pdf/x.doi.pdf"
  );

  // The second record has no DOI and no scraped link: unresolvable.
  let url = resolve_document_url(
    &base(),
    records[1].pmc()?,
    records[1].doi_or_pii().as_deref(),
    &ArticlePage::default(),
  );
  assert!(url.is_none());

  Ok(())
}

#[traced_test]
#[tokio::test]
async fn ledger_round_trip_filters_reprocessing() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let ledger = Ledger::open(dir.path().join("ledger.sqlite")).await?;

  assert!(!ledger.contains("PMC3817617").await?);
  ledger.record("PMC3817617", Utc::now()).await?;
  assert!(ledger.contains("PMC3817617").await?);

  // A second run sees the entry and filters the record out.
  let records: Vec<_> =
    RecordReader::new(RECORDS.as_bytes()).collect::<Result<Vec<_>>>()?;
  let mut unseen = Vec::new();
  for record in &records {
    if !ledger.contains(record.pmc()?).await? {
      unseen.push(record.pmc()?.to_owned());
    }
  }
  assert_eq!(unseen, vec!["PMC999".to_owned()]);

  Ok(())
}
