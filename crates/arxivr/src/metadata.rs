//! Archival metadata derivation.
//!
//! Maps MEDLINE record fields (plus optionally scraped page data) into the
//! flat field/value mapping the archive service expects. The rules are
//! fixed and deterministic: the same record and page always produce the
//! same mapping, and entries whose derived value is empty are omitted
//! entirely.
//!
//! # Examples
//!
//! ```
//! use arxivr::{medline::RecordReader, metadata::ItemMetadata};
//! use url::Url;
//!
//! let input = "PMC - PMC123\nAID - 10.1234/x.doi [doi]\nDEP - 20140102\n\n";
//! let record = RecordReader::new(input.as_bytes()).next().unwrap().unwrap();
//! let base = Url::parse("http://www.ncbi.nlm.nih.gov").unwrap();
//!
//! let md = ItemMetadata::from_record(&record, None, &base).unwrap();
//! assert_eq!(md.identifier(), "pubmed-PMC123");
//! assert_eq!(md.single("date"), Some("2014-01-02"));
//! ```

use super::*;
use crate::{medline::MedlineRecord, scrape::ArticlePage};

/// Media type for every uploaded item.
const MEDIATYPE: &str = "texts";
/// Collection every uploaded item lands in.
const COLLECTION: &str = "pubmed";

/// A metadata field value: a single string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
  /// A scalar field such as `title` or `date`.
  Single(String),
  /// A repeatable field such as `creator` or `external-identifier`.
  Many(Vec<String>),
}

/// The flat metadata mapping uploaded with an archive item.
///
/// Backed by an ordered map so that repeated derivation from the same
/// inputs yields byte-identical output. Empty values never make it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMetadata {
  /// Deterministic item identifier, `pubmed-<PMC>`.
  identifier: String,
  /// Field name to value, ordered by field name.
  entries:    BTreeMap<String, MetadataValue>,
}

impl ItemMetadata {
  /// Derives the metadata mapping for a record.
  ///
  /// `page` contributes the optional contributor note; `base` is the
  /// publisher base URL used for the `source` field.
  ///
  /// # Errors
  ///
  /// Returns [`ArxivrError::MissingAccession`] when the record has no
  /// usable PMC accession; everything else is best-effort and omitted
  /// when underivable.
  pub fn from_record(
    record: &MedlineRecord,
    page: Option<&ArticlePage>,
    base: &Url,
  ) -> Result<Self> {
    let pmc = record.pmc()?;
    let identifier = format!("pubmed-{pmc}");

    let mut metadata =
      Self { identifier: identifier.clone(), entries: BTreeMap::new() };

    metadata.insert_single("mediatype", Some(MEDIATYPE.to_owned()));
    metadata.insert_single("collection", Some(COLLECTION.to_owned()));
    metadata.insert_single("identifier", Some(identifier.clone()));

    metadata.insert_single("title", record.first("TI").map(str::to_owned));
    metadata.insert_many("creator", derive_creator(record));
    metadata.insert_single("date", Some(derive_date(record)));
    metadata.insert_single("language", Some(derive_language(record)));
    metadata.insert_single("description", Some(derive_description(record)));
    metadata
      .insert_single("source", scrape::article_url(base, pmc).ok().map(|url| url.to_string()));
    metadata.insert_many("external-identifier", derive_external_identifiers(record, &identifier));
    metadata.insert_single("journaltitle", record.first("JT").map(str::to_owned));
    metadata.insert_many("issn", record.all("IS").to_vec());
    metadata.insert_single("volume", record.first("VI").map(str::to_owned));
    metadata.insert_single("contributor", derive_contributor(page, &identifier));

    Ok(metadata)
  }

  /// The deterministic archive item identifier.
  pub fn identifier(&self) -> &str { &self.identifier }

  /// Looks up a field by name.
  pub fn get(&self, key: &str) -> Option<&MetadataValue> { self.entries.get(key) }

  /// Looks up a scalar field by name.
  pub fn single(&self, key: &str) -> Option<&str> {
    match self.entries.get(key) {
      Some(MetadataValue::Single(value)) => Some(value),
      _ => None,
    }
  }

  /// Iterates fields in deterministic (name) order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
    self.entries.iter().map(|(key, value)| (key.as_str(), value))
  }

  /// Inserts a scalar field, dropping empty or absent values.
  fn insert_single(&mut self, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
      self.entries.insert(key.to_owned(), MetadataValue::Single(value));
    }
  }

  /// Inserts a list field, dropping empty values and empty lists.
  fn insert_many(&mut self, key: &str, values: Vec<String>) {
    let values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
    if !values.is_empty() {
      self.entries.insert(key.to_owned(), MetadataValue::Many(values));
    }
  }
}

/// Full author names, falling back to the abbreviated author field.
fn derive_creator(record: &MedlineRecord) -> Vec<String> {
  let full = record.all("FAU");
  if full.is_empty() { record.all("AU").to_vec() } else { full.to_vec() }
}

/// Publication date, as `YYYY-MM-DD` when a calendar date is derivable.
///
/// Tries the electronic publication date, then the first token of the last
/// publication-history entry; a parse failure falls through to the year
/// prefix of the electronic date, then the first token of the generic
/// publication date. Never errors.
fn derive_date(record: &MedlineRecord) -> String {
  let raw = record
    .first("DEP")
    .map(str::to_owned)
    .or_else(|| {
      record.all("PHST").last().and_then(|entry| entry.split_whitespace().next()).map(str::to_owned)
    });

  if let Some(date) = raw.as_deref().and_then(parse_calendar_date) {
    return date.format("%Y-%m-%d").to_string();
  }

  record
    .first("DEP")
    .map(|dep| dep.chars().take(4).collect::<String>())
    .filter(|year| !year.is_empty())
    .or_else(|| {
      record.first("DP").and_then(|dp| dp.split_whitespace().next()).map(str::to_owned)
    })
    .unwrap_or_default()
}

/// Attempts the date formats seen in MEDLINE exports.
fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
  const FORMATS: &[&str] = &["%Y%m%d", "%Y/%m/%d", "%Y-%m-%d", "%Y %b %d"];
  FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// First language entry, defaulting to English.
fn derive_language(record: &MedlineRecord) -> String {
  record.first("LA").unwrap_or("eng").to_owned()
}

/// HTML description: journal/volume search links plus the raw abstract.
fn derive_description(record: &MedlineRecord) -> String {
  let mut description = String::new();

  if let Some(journal) = record.first("JT") {
    description.push_str(&format!(
      "This article is from \
       <a href=\"//archive.org/search.php?query=journaltitle%3A%28{journal}%29\">{journal}</a>"
    ));
    if let Some(volume) = record.first("VI") {
      description.push_str(&format!(
        ", <a href=\"//archive.org/search.php?query=journaltitle%3A%28{journal}%29%20\
         AND%20volume%3A%28{volume}%29\">volume {volume}</a>."
      ));
    } else {
      description.push('.');
    }
  }

  description.push_str("<h2>Abstract</h2>");
  description.push_str(record.first("AB").unwrap_or_default());
  description
}

/// `type:value` pairs from the article-identifier entries.
fn derive_external_identifiers(record: &MedlineRecord, identifier: &str) -> Vec<String> {
  let external: Vec<String> = record
    .all("AID")
    .iter()
    .filter_map(|aid| {
      let value = aid.split_whitespace().next()?;
      let kind = aid.split_whitespace().last()?.trim_matches(['[', ']']);
      Some(format!("{kind}:{value}"))
    })
    .collect();

  if external.is_empty() {
    warn!("could not find external-identifiers - {identifier}");
  }
  external
}

/// Contributor from the scraped courtesy note, when one was found.
fn derive_contributor(page: Option<&ArticlePage>, identifier: &str) -> Option<String> {
  let page = page?;
  if page.courtesy_note.is_none() {
    warn!("could not find contributor - {identifier}");
  }
  page.courtesy_note.clone()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::medline::RecordReader;

  fn base() -> Url { Url::parse("http://www.ncbi.nlm.nih.gov").unwrap() }

  fn parse(input: &str) -> MedlineRecord {
    RecordReader::new(input.as_bytes()).next().unwrap().unwrap()
  }

  #[test]
  fn derives_the_fixed_fields() {
    let record = parse("PMC - PMC123\nAID - 10.1234/x.doi [doi]\nDEP - 20140102\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();

    assert_eq!(md.identifier(), "pubmed-PMC123");
    assert_eq!(md.single("mediatype"), Some("texts"));
    assert_eq!(md.single("collection"), Some("pubmed"));
    assert_eq!(md.single("date"), Some("2014-01-02"));
    assert_eq!(md.single("source"), Some("http://www.ncbi.nlm.nih.gov/pmc/articles/PMC123"));
    assert_eq!(
      md.get("external-identifier"),
      Some(&MetadataValue::Many(vec!["doi:10.1234/x.doi".to_owned()]))
    );
  }

  #[test]
  fn empty_values_never_appear() {
    let record = parse("PMC - PMC123\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();

    assert!(md.get("title").is_none());
    assert!(md.get("journaltitle").is_none());
    assert!(md.get("volume").is_none());
    assert!(md.get("contributor").is_none());
    assert!(md.get("external-identifier").is_none());
    // No date is derivable at all here.
    assert!(md.get("date").is_none());
  }

  #[test]
  fn date_falls_back_to_publication_history() {
    let record = parse(
      "PMC - PMC1\nPHST- 2013/06/14 [received]\nPHST- 2013/10/21 [accepted]\n\n",
    );
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(md.single("date"), Some("2013-10-21"));
  }

  #[test]
  fn unparseable_date_falls_back_to_year_then_dp() {
    let record = parse("PMC - PMC1\nDEP - 2014xx\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(md.single("date"), Some("2014"));

    let record = parse("PMC - PMC1\nDP  - 2014 Jan-Feb\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(md.single("date"), Some("2014"));
  }

  #[test]
  fn language_defaults_to_english() {
    let md =
      ItemMetadata::from_record(&parse("PMC - PMC1\n\n"), None, &base()).unwrap();
    assert_eq!(md.single("language"), Some("eng"));

    let md =
      ItemMetadata::from_record(&parse("PMC - PMC1\nLA  - fre\nLA  - eng\n\n"), None, &base())
        .unwrap();
    assert_eq!(md.single("language"), Some("fre"));
  }

  #[test]
  fn description_links_journal_and_volume() {
    let record = parse("PMC - PMC1\nJT  - Virology\nVI  - 12\nAB  - Findings.\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(
      md.single("description"),
      Some(
        "This article is from \
         <a href=\"//archive.org/search.php?query=journaltitle%3A%28Virology%29\">Virology</a>, \
         <a href=\"//archive.org/search.php?query=journaltitle%3A%28Virology%29%20\
         AND%20volume%3A%2812%29\">volume 12</a>.\
         <h2>Abstract</h2>Findings."
      )
    );
  }

  #[test]
  fn description_without_volume_closes_with_a_period() {
    let record = parse("PMC - PMC1\nJT  - Virology\nAB  - Findings.\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(
      md.single("description"),
      Some(
        "This article is from \
         <a href=\"//archive.org/search.php?query=journaltitle%3A%28Virology%29\">Virology</a>.\
         <h2>Abstract</h2>Findings."
      )
    );
  }

  #[test]
  fn creator_prefers_full_author_names() {
    let record =
      parse("PMC - PMC1\nFAU - Researcher, Alice\nFAU - Scholar, Bob\nAU  - Researcher A\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(
      md.get("creator"),
      Some(&MetadataValue::Many(vec![
        "Researcher, Alice".to_owned(),
        "Scholar, Bob".to_owned()
      ]))
    );

    let record = parse("PMC - PMC1\nAU  - Researcher A\n\n");
    let md = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(md.get("creator"), Some(&MetadataValue::Many(vec!["Researcher A".to_owned()])));
  }

  #[test]
  fn contributor_comes_from_the_scraped_page() {
    let page = ArticlePage {
      pdf_href:      None,
      courtesy_note: Some("Example University Library".to_owned()),
    };
    let record = parse("PMC - PMC1\n\n");
    let md = ItemMetadata::from_record(&record, Some(&page), &base()).unwrap();
    assert_eq!(md.single("contributor"), Some("Example University Library"));
  }

  #[test]
  fn derivation_is_idempotent() {
    let record = parse(
      "PMC - PMC123\nTI  - A title\nJT  - Virology\nVI  - 12\nAB  - Findings.\n\
       AID - 10.1234/x.doi [doi]\nDEP - 20140102\nFAU - Researcher, Alice\n\n",
    );
    let first = ItemMetadata::from_record(&record, None, &base()).unwrap();
    let second = ItemMetadata::from_record(&record, None, &base()).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn missing_accession_is_an_error() {
    let record = parse("TI  - No accession here\n\n");
    assert!(matches!(
      ItemMetadata::from_record(&record, None, &base()),
      Err(ArxivrError::MissingAccession)
    ));
  }
}
