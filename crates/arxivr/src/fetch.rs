//! Document URL resolution and streamed download.
//!
//! A record with both a PMC accession and a DOI/PII gets a direct document
//! URL on the publisher's site; records without one fall back to the link
//! scraped from the article page. The download itself is streamed to a
//! staging file in chunks, with a single EPUB retry when the PDF is not
//! served.

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::*;
use crate::scrape::ArticlePage;

/// A downloaded document staged on local disk.
#[derive(Debug)]
pub struct Download {
  /// Where the document was written.
  pub path:     PathBuf,
  /// Upload filename, `<pmc>-<last URL segment>`.
  pub filename: String,
}

/// Resolves the document URL for a record.
///
/// With a DOI/PII the URL is constructed directly as
/// `<base>/pmc/articles/<pmc>/pdf/<doi>.pdf`; otherwise the link scraped
/// from the article page is used. Returns `None` when neither source
/// yields a URL.
///
/// # Examples
///
/// ```
/// use arxivr::{fetch::resolve_document_url, scrape::ArticlePage};
/// use url::Url;
///
/// let base = Url::parse("http://www.ncbi.nlm.nih.gov").unwrap();
/// let url = resolve_document_url(&base, "PMC123", Some("x.doi"), &ArticlePage::default());
/// assert_eq!(url.unwrap().as_str(), "http://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/pdf/x.doi.pdf");
/// ```
pub fn resolve_document_url(
  base: &Url,
  pmc: &str,
  doi: Option<&str>,
  page: &ArticlePage,
) -> Option<Url> {
  match doi {
    Some(doi) => base.join(&format!("/pmc/articles/{pmc}/pdf/{doi}.pdf")).ok(),
    None => page.pdf_href.clone(),
  }
}

/// Rewrites a `.pdf` URL to its `.epub` sibling.
///
/// Only the trailing extension changes; the rest of the path (including a
/// `/pdf/` segment) is left alone. Returns `None` for URLs that do not end
/// in `.pdf`.
pub fn epub_fallback(url: &Url) -> Option<Url> {
  url
    .as_str()
    .strip_suffix(".pdf")
    .map(|stem| format!("{stem}.epub"))
    .and_then(|fallback| Url::parse(&fallback).ok())
}

/// Downloads the document at `url` into `dir`, streaming in chunks.
///
/// On a non-success status the download is retried once against the EPUB
/// sibling URL. The staged file is named `<pmc>-<last URL segment>`.
///
/// # Errors
///
/// Returns [`ArxivrError::DocumentUnavailable`] when both attempts return
/// a non-success status; transport and file system errors are propagated.
pub async fn download(
  client: &reqwest::Client,
  url: &Url,
  pmc: &str,
  dir: &Path,
) -> Result<Download> {
  let mut fetched_url = url.clone();
  let mut response = client.get(url.clone()).send().await?;

  if !response.status().is_success() {
    let Some(fallback) = epub_fallback(url) else {
      return Err(ArxivrError::DocumentUnavailable {
        accession: pmc.to_owned(),
        status:    response.status().as_u16(),
      });
    };
    info!("document fetch returned {}, trying EPUB: {fallback}", response.status());
    response = client.get(fallback.clone()).send().await?;
    if !response.status().is_success() {
      error!("cannot find PDF or EPUB for article {pmc}");
      return Err(ArxivrError::DocumentUnavailable {
        accession: pmc.to_owned(),
        status:    response.status().as_u16(),
      });
    }
    fetched_url = fallback;
  }

  let segment = fetched_url
    .path_segments()
    .and_then(|segments| segments.last())
    .filter(|segment| !segment.is_empty())
    .unwrap_or("document");
  let filename = format!("{pmc}-{segment}");
  let path = dir.join(&filename);

  let mut file = tokio::fs::File::create(&path).await?;
  let mut stream = response.bytes_stream();
  while let Some(chunk) = stream.next().await {
    file.write_all(&chunk?).await?;
  }
  file.flush().await?;

  info!("downloaded: {fetched_url}");
  Ok(Download { path, filename })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base() -> Url { Url::parse("http://www.ncbi.nlm.nih.gov").unwrap() }

  #[test]
  fn doi_builds_a_direct_url() {
    let url = resolve_document_url(&base(), "PMC123", Some("x.doi"), &ArticlePage::default());
    assert_eq!(
      url.unwrap().as_str(),
      "http://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/pdf/x.doi.pdf"
    );
  }

  #[test]
  fn missing_doi_falls_back_to_the_scraped_link() {
    let page = ArticlePage {
      pdf_href:      Some(Url::parse("http://www.ncbi.nlm.nih.gov/scraped/article.pdf").unwrap()),
      courtesy_note: None,
    };
    let url = resolve_document_url(&base(), "PMC123", None, &page);
    assert_eq!(url.unwrap().as_str(), "http://www.ncbi.nlm.nih.gov/scraped/article.pdf");
  }

  #[test]
  fn no_doi_and_no_scraped_link_is_unresolvable() {
    assert!(resolve_document_url(&base(), "PMC123", None, &ArticlePage::default()).is_none());
  }

  #[test]
  fn epub_fallback_rewrites_only_the_extension() {
    let url =
      Url::parse("http://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/pdf/x.doi.pdf").unwrap();
    assert_eq!(
      epub_fallback(&url).unwrap().as_str(),
      "http://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/pdf/x.doi.epub"
    );
  }

  #[test]
  fn epub_fallback_requires_a_pdf_url() {
    let url = Url::parse("http://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/epub/").unwrap();
    assert!(epub_fallback(&url).is_none());
  }
}
