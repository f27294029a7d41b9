//! Error types for the arxivrd CLI.

use thiserror::Error;

/// Error type alias used for the `arxivrd` binary.
pub type Result<T> = core::result::Result<T, ArxivrdError>;

/// Errors surfaced to the user by the CLI.
#[derive(Error, Debug)]
pub enum ArxivrdError {
  /// A pipeline error from the `arxivr` library.
  #[error(transparent)]
  Arxivr(#[from] arxivr::error::ArxivrError),

  /// A file system operation failed before the pipeline started.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
