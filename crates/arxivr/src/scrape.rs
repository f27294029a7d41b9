//! Publisher article-page fetching and scraping.
//!
//! The publisher's article page serves two purposes here: it carries a
//! "Formats" menu with a direct PDF link for records whose MEDLINE data has
//! no DOI/PII, and it sometimes carries a courtesy note naming the
//! institution that contributed the scans.
//!
//! The HTML is parsed eagerly into an [`ArticlePage`] holding only the
//! extracted strings, so no parser state needs to live across an await
//! point.

use scraper::{Html, Selector};

use super::*;

lazy_static! {
  /// Anchors inside the formats menu of an article page.
  static ref FORMAT_MENU_LINK: Selector = Selector::parse("div.format-menu a").unwrap();
  /// Emphasized text inside the scanning-courtesy note.
  static ref COURTESY_NOTE: Selector = Selector::parse("div.courtesy-note strong").unwrap();
}

/// The pieces of an article page the pipeline cares about.
///
/// # Examples
///
/// ```
/// use arxivr::scrape::ArticlePage;
/// use url::Url;
///
/// let base = Url::parse("http://www.ncbi.nlm.nih.gov/pmc/articles/PMC123").unwrap();
/// let html = r#"<div class="format-menu"><a href="/pmc/articles/PMC123/pdf/x.pdf">PDF</a></div>"#;
/// let page = ArticlePage::parse(html, &base);
/// assert!(page.pdf_href.unwrap().as_str().ends_with(".pdf"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArticlePage {
  /// Absolute URL of the first `.pdf` link in the formats menu.
  pub pdf_href:      Option<Url>,
  /// Text of the contributor courtesy note, when present.
  pub courtesy_note: Option<String>,
}

impl ArticlePage {
  /// Extracts the download link and courtesy note from raw HTML.
  ///
  /// Relative hrefs are resolved against `base` (the page's own URL).
  /// Missing pieces come back as `None`; scraping is best-effort and
  /// never fails outright.
  pub fn parse(html: &str, base: &Url) -> Self {
    let document = Html::parse_document(html);

    let pdf_href = document
      .select(&FORMAT_MENU_LINK)
      .filter_map(|anchor| anchor.value().attr("href"))
      .find(|href| href.ends_with(".pdf"))
      .and_then(|href| base.join(href).ok());

    let courtesy_note = document
      .select(&COURTESY_NOTE)
      .map(|strong| strong.text().collect::<String>().trim().to_owned())
      .find(|text| !text.is_empty());

    Self { pdf_href, courtesy_note }
  }
}

/// Returns the canonical article-page URL for a PMC accession.
///
/// # Errors
///
/// Returns an error when the accession cannot be joined onto `base`.
pub fn article_url(base: &Url, pmc: &str) -> Result<Url> {
  Ok(base.join(&format!("/pmc/articles/{pmc}"))?)
}

/// Fetches and scrapes the article page at `url`.
///
/// # Errors
///
/// Transport errors are propagated; there is no retry at this layer.
pub async fn fetch_article_page(client: &reqwest::Client, url: &Url) -> Result<ArticlePage> {
  debug!("fetching article page: {url}");
  let body = client.get(url.clone()).send().await?.text().await?;
  Ok(ArticlePage::parse(&body, url))
}
