//! MEDLINE record parsing.
//!
//! This module reads the MEDLINE text format used by PubMed exports: fixed
//! short field tags padded to four columns, a `- ` separator, six-space
//! indented continuation lines, and a blank line between records.
//!
//! ```text
//! PMID- 24229398
//! PMC - PMC3817617
//! TI  - Example article title that wraps onto
//!       a continuation line.
//! AID - 10.1234/x.doi [doi]
//! ```
//!
//! Records come out of [`RecordReader`], a lazy, single-pass iterator. The
//! stream cannot be restarted; consuming it twice requires re-opening the
//! underlying file.
//!
//! # Examples
//!
//! ```
//! use arxivr::medline::RecordReader;
//!
//! let input = "PMC - PMC123\nTI  - A title\n\n";
//! let mut reader = RecordReader::new(input.as_bytes());
//! let record = reader.next().unwrap().unwrap();
//! assert_eq!(record.first("TI"), Some("A title"));
//! ```

use std::{
  fs::File,
  io::{BufRead, BufReader},
};

use super::*;

lazy_static! {
  /// PubMed Central accessions look like `PMC` followed by digits.
  static ref PMC_ACCESSION: Regex = Regex::new(r"^PMC\d+$").unwrap();
}

/// A single bibliographic record parsed from a MEDLINE stream.
///
/// A record is an immutable mapping from fixed field tags (`PMC`, `TI`,
/// `AU`, `DEP`, ...) to one or more string values; repeated tags such as
/// `AU` or `AID` accumulate in order. The record serializes as a plain
/// JSON object so the raw input can be uploaded alongside the document.
///
/// # Examples
///
/// ```
/// use arxivr::medline::RecordReader;
///
/// let input = "PMC - PMC123\nAID - 10.1234/x.doi [doi]\n\n";
/// let record = RecordReader::new(input.as_bytes()).next().unwrap().unwrap();
/// assert_eq!(record.pmc().unwrap(), "PMC123");
/// assert_eq!(record.doi_or_pii().as_deref(), Some("x.doi"));
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct MedlineRecord {
  /// Field tag to accumulated values, in deterministic order.
  fields: BTreeMap<String, Vec<String>>,
}

impl MedlineRecord {
  /// Returns the first value recorded for `tag`, if any.
  pub fn first(&self, tag: &str) -> Option<&str> {
    self.fields.get(tag).and_then(|values| values.first()).map(String::as_str)
  }

  /// Returns every value recorded for `tag`, empty when the tag is absent.
  pub fn all(&self, tag: &str) -> &[String] {
    self.fields.get(tag).map(Vec::as_slice).unwrap_or(&[])
  }

  /// True when no fields have been recorded.
  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  /// Returns the validated PMC accession for this record.
  ///
  /// # Errors
  ///
  /// Returns [`ArxivrError::MissingAccession`] when the `PMC` field is
  /// absent or does not look like `PMC<digits>`.
  pub fn pmc(&self) -> Result<&str> {
    self
      .first("PMC")
      .filter(|value| PMC_ACCESSION.is_match(value))
      .ok_or(ArxivrError::MissingAccession)
  }

  /// Extracts a DOI or PII suffix from the `AID` entries.
  ///
  /// Scans for an entry marked `[doi]` first, then `[pii]`, and returns
  /// the last `/`-separated segment of the identifier token. This suffix
  /// names the downloadable file on the publisher's site, e.g.
  /// `10.1234/x.doi [doi]` becomes `x.doi`.
  pub fn doi_or_pii(&self) -> Option<String> {
    for marker in ["doi", "pii"] {
      for aid in self.all("AID") {
        if aid.contains(marker) {
          return aid
            .split_whitespace()
            .next()
            .and_then(|token| token.rsplit('/').next())
            .map(str::to_owned);
        }
      }
    }
    None
  }

  /// Records a value for `tag`, accumulating repeats in order.
  fn push(&mut self, tag: &str, value: &str) {
    self.fields.entry(tag.to_owned()).or_default().push(value.to_owned());
  }

  /// Appends continuation text to the last value recorded for `tag`.
  fn extend_last(&mut self, tag: &str, text: &str) {
    if let Some(last) = self.fields.get_mut(tag).and_then(|values| values.last_mut()) {
      last.push(' ');
      last.push_str(text);
    }
  }
}

/// Lazy, single-pass iterator of [`MedlineRecord`]s over a MEDLINE stream.
///
/// Yields `Result<MedlineRecord>` so a malformed line surfaces as an error
/// for that record without poisoning the rest of the stream.
pub struct RecordReader<R> {
  /// Buffered source of MEDLINE text.
  reader: R,
  /// Set once EOF has been observed.
  done:   bool,
}

impl RecordReader<BufReader<File>> {
  /// Opens a MEDLINE records file for iteration.
  ///
  /// # Errors
  ///
  /// Returns an I/O error when the file cannot be opened.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    Ok(Self::new(BufReader::new(File::open(path.as_ref())?)))
  }
}

impl<R: BufRead> RecordReader<R> {
  /// Wraps any buffered reader producing MEDLINE text.
  pub fn new(reader: R) -> Self { Self { reader, done: false } }
}

impl<R: BufRead> Iterator for RecordReader<R> {
  type Item = Result<MedlineRecord>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let mut record = MedlineRecord::default();
    let mut last_tag: Option<String> = None;
    let mut line = String::new();

    loop {
      line.clear();
      match self.reader.read_line(&mut line) {
        Ok(0) => {
          self.done = true;
          return if record.is_empty() { None } else { Some(Ok(record)) };
        },
        Ok(_) => {},
        Err(e) => {
          self.done = true;
          return Some(Err(e.into()));
        },
      }

      let text = line.trim_end_matches(['\r', '\n']);
      if text.trim().is_empty() {
        if record.is_empty() {
          // Tolerate blank lines between records.
          continue;
        }
        return Some(Ok(record));
      }

      if let Some(continuation) = text.strip_prefix("      ") {
        match &last_tag {
          Some(tag) => record.extend_last(tag, continuation.trim_start()),
          None => return Some(Err(ArxivrError::MalformedRecord(text.to_owned()))),
        }
        continue;
      }

      match (text.get(..4), text.get(4..6), text.get(6..)) {
        (Some(tag), Some("- "), Some(value)) => {
          let tag = tag.trim_end();
          record.push(tag, value);
          last_tag = Some(tag.to_owned());
        },
        _ => return Some(Err(ArxivrError::MalformedRecord(text.to_owned()))),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = "PMID- 24229398\n\
                        PMC - PMC3817617\n\
                        TI  - An example article title that happens to wrap\n      onto a second line.\n\
                        FAU - Researcher, Alice\n\
                        AU  - Researcher A\n\
                        LA  - eng\n\
                        AID - 10.1234/x.doi [doi]\n\
                        DEP - 20140102\n\
                        \n\
                        PMC - PMC999\n\
                        TI  - Second record\n\
                        \n";

  #[test]
  fn parses_multiple_records() {
    let records: Vec<_> =
      RecordReader::new(SAMPLE.as_bytes()).collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].pmc().unwrap(), "PMC3817617");
    assert_eq!(records[1].pmc().unwrap(), "PMC999");
  }

  #[test]
  fn continuation_lines_join_with_a_space() {
    let record = RecordReader::new(SAMPLE.as_bytes()).next().unwrap().unwrap();
    assert_eq!(
      record.first("TI"),
      Some("An example article title that happens to wrap onto a second line.")
    );
  }

  #[test]
  fn repeated_tags_accumulate() {
    let input = "PMC - PMC1\nAID - 10.1/a [pii]\nAID - 10.1/b [doi]\n\n";
    let record = RecordReader::new(input.as_bytes()).next().unwrap().unwrap();
    assert_eq!(record.all("AID").len(), 2);
  }

  #[test]
  fn doi_preferred_over_pii() {
    let input = "PMC - PMC1\nAID - S0001(13)0001-2 [pii]\nAID - 10.1234/x.doi [doi]\n\n";
    let record = RecordReader::new(input.as_bytes()).next().unwrap().unwrap();
    assert_eq!(record.doi_or_pii().as_deref(), Some("x.doi"));
  }

  #[test]
  fn pii_used_when_no_doi() {
    let input = "PMC - PMC1\nAID - S0001(13)0001-2 [pii]\n\n";
    let record = RecordReader::new(input.as_bytes()).next().unwrap().unwrap();
    assert_eq!(record.doi_or_pii().as_deref(), Some("S0001(13)0001-2"));
  }

  #[test]
  fn missing_trailing_blank_line_still_yields_final_record() {
    let input = "PMC - PMC42\nTI  - No trailing separator";
    let records: Vec<_> =
      RecordReader::new(input.as_bytes()).collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pmc().unwrap(), "PMC42");
  }

  #[test]
  fn invalid_accession_is_rejected() {
    let input = "PMC - 3817617\n\n";
    let record = RecordReader::new(input.as_bytes()).next().unwrap().unwrap();
    assert!(matches!(record.pmc(), Err(ArxivrError::MissingAccession)));
  }

  #[test]
  fn malformed_line_surfaces_as_error() {
    let input = "PMC - PMC1\nnot a medline line\n";
    let mut reader = RecordReader::new(input.as_bytes());
    assert!(matches!(reader.next(), Some(Err(ArxivrError::MalformedRecord(_)))));
  }

  #[test]
  fn record_serializes_as_plain_object() {
    let input = "PMC - PMC1\nAU  - One\nAU  - Two\n\n";
    let record = RecordReader::new(input.as_bytes()).next().unwrap().unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["PMC"][0], "PMC1");
    assert_eq!(json["AU"][1], "Two");
  }
}
