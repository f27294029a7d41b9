//! Remote archive-item upload client.
//!
//! The archive service exposes an S3-style interface: an item is a bucket
//! named by its identifier, files are `PUT` into it, and item metadata
//! rides along as `x-archive-meta*` headers on the bucket-creating
//! request. The service applies its own consistency handling; this client
//! only adds a fixed retry count with a fixed sleep between attempts, as
//! the historical ingest scripts did (100 retries, 20 seconds).
//!
//! An archive operation succeeds only when every per-file response
//! reports HTTP 200; there is no partial-success state.

use reqwest::{
  header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
  StatusCode,
};
use tokio::time::{sleep, Duration};

use super::*;
use crate::{
  config::IngestConfig,
  metadata::{ItemMetadata, MetadataValue},
};

/// A locally staged file to upload into an archive item.
#[derive(Debug)]
pub struct UploadFile {
  /// Path of the staged file on disk.
  pub path:     PathBuf,
  /// Name the file gets inside the archive item.
  pub filename: String,
}

/// Client for the archive's item API.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
  /// Shared HTTP client.
  client:            reqwest::Client,
  /// S3-style upload endpoint.
  upload_endpoint:   Url,
  /// Read-only metadata endpoint for existence probes.
  metadata_endpoint: Url,
  /// Optional `(access, secret)` credential pair.
  auth:              Option<(String, String)>,
  /// Per-file retry count.
  retries:           u32,
  /// Fixed sleep between retries.
  retry_sleep:       Duration,
  /// Whether the archive should queue derivative generation.
  queue_derive:      bool,
}

impl ArchiveClient {
  /// Builds a client from the pipeline configuration.
  pub fn new(client: reqwest::Client, config: &IngestConfig) -> Self {
    let auth = match (&config.access_key, &config.secret_key) {
      (Some(access), Some(secret)) => Some((access.clone(), secret.clone())),
      _ => None,
    };
    Self {
      client,
      upload_endpoint: config.upload_endpoint.clone(),
      metadata_endpoint: config.metadata_endpoint.clone(),
      auth,
      retries: config.upload_retries,
      retry_sleep: Duration::from_secs(config.retry_sleep_secs),
      queue_derive: config.queue_derive,
    }
  }

  /// True when an item with this identifier already exists remotely.
  ///
  /// The metadata endpoint returns an empty object for unknown items, so
  /// existence is "the response carries a metadata section".
  ///
  /// # Errors
  ///
  /// Transport and decode errors are propagated.
  pub async fn item_exists(&self, identifier: &str) -> Result<bool> {
    let url = self.metadata_endpoint.join(identifier)?;
    debug!("probing archive item: {url}");
    let value: serde_json::Value = self.client.get(url).send().await?.json().await?;
    Ok(value.get("metadata").is_some())
  }

  /// Uploads `files` into the item named `identifier`.
  ///
  /// The first file's request creates the bucket and carries the
  /// metadata headers; subsequent files are plain `PUT`s. Each file is
  /// attempted up to the configured retry count with the configured
  /// sleep in between. The caller decides success from the returned
  /// per-file statuses.
  ///
  /// # Errors
  ///
  /// Returns an error when a file cannot be read, or when a request
  /// still fails at the transport level after the final retry. Non-200
  /// responses are not errors here; they come back as statuses.
  pub async fn upload(
    &self,
    identifier: &str,
    files: &[UploadFile],
    metadata: &ItemMetadata,
  ) -> Result<Vec<StatusCode>> {
    let mut statuses = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
      let url = self.upload_endpoint.join(&format!("/{identifier}/{}", file.filename))?;
      let body = tokio::fs::read(&file.path).await?;

      let mut attempt = 0;
      let status = loop {
        let mut request = self.client.put(url.clone()).body(body.clone());
        if index == 0 {
          request = request.headers(self.item_headers(metadata));
        }
        if let Some((access, secret)) = &self.auth {
          request = request.header(AUTHORIZATION, format!("LOW {access}:{secret}"));
        }

        match request.send().await {
          Ok(response) if response.status().is_success() => break response.status(),
          Ok(response) => {
            attempt += 1;
            if attempt > self.retries {
              break response.status();
            }
            warn!(
              "upload of {} returned {}, retry {attempt}/{} in {:?}",
              file.filename,
              response.status(),
              self.retries,
              self.retry_sleep
            );
            sleep(self.retry_sleep).await;
          },
          Err(e) => {
            attempt += 1;
            if attempt > self.retries {
              return Err(e.into());
            }
            warn!(
              "upload of {} failed ({e}), retry {attempt}/{} in {:?}",
              file.filename, self.retries, self.retry_sleep
            );
            sleep(self.retry_sleep).await;
          },
        }
      };
      statuses.push(status);
    }

    Ok(statuses)
  }

  /// Headers for the bucket-creating request: metadata plus bucket and
  /// derive controls.
  fn item_headers(&self, metadata: &ItemMetadata) -> HeaderMap {
    let mut headers = metadata_headers(metadata);
    headers.insert("x-archive-auto-make-bucket", HeaderValue::from_static("1"));
    if !self.queue_derive {
      headers.insert("x-archive-queue-derive", HeaderValue::from_static("0"));
    }
    headers
  }
}

/// Encodes a metadata mapping as `x-archive-meta*` headers.
///
/// Scalar fields become `x-archive-meta-<field>`; list fields become
/// numbered `x-archive-meta<NN>-<field>` headers. Control characters in
/// values are flattened to spaces; a value that still cannot be carried
/// in a header is dropped with a warning rather than failing the upload.
fn metadata_headers(metadata: &ItemMetadata) -> HeaderMap {
  let mut headers = HeaderMap::new();

  let mut put = |name: String, value: &str| {
    let cleaned: String =
      value.chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
    match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_bytes(cleaned.as_bytes())) {
      (Ok(name), Ok(value)) => {
        headers.insert(name, value);
      },
      _ => warn!("dropping metadata field unrepresentable as a header: {name}"),
    }
  };

  for (field, value) in metadata.iter() {
    match value {
      MetadataValue::Single(single) => put(format!("x-archive-meta-{field}"), single),
      MetadataValue::Many(many) =>
        for (index, entry) in many.iter().enumerate() {
          put(format!("x-archive-meta{:02}-{field}", index + 1), entry);
        },
    }
  }

  headers
}
