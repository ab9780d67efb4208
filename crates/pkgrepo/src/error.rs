use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::http::HttpError;
use crate::repository::NoMatchedVersion;

#[derive(Error, Debug)]
pub enum RepositoryError {
    // Source errors
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    // Version selection errors
    #[error("{0}")]
    NoMatchedVersion(#[from] NoMatchedVersion),

    // Download errors
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Checksum mismatch for {url}")]
    ChecksumMismatch { url: String },

    // Unpack errors
    #[error("Decompress failed for {}: {reason}", file.display())]
    Decompress { file: PathBuf, reason: String },

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    // Cache errors
    #[error("Package not found in cache")]
    CacheMiss,

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepositoryError {
    /// Wrap a transport failure for `url`
    pub fn download(url: &str, reason: impl ToString) -> Self {
        RepositoryError::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Tag an unpack failure with the file that could not be expanded.
    ///
    /// A `Decompress` error keeps its own file; anything else is converted.
    pub fn decompress(file: &Path, err: RepositoryError) -> Self {
        match err {
            RepositoryError::Decompress { .. } => err,
            other => RepositoryError::Decompress {
                file: file.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self, RepositoryError::CacheMiss)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, RepositoryError::Unsupported(_))
    }

    pub fn is_no_matched_version(&self) -> bool {
        matches!(self, RepositoryError::NoMatchedVersion(_))
    }
}

impl From<HttpError> for RepositoryError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Io(e) => RepositoryError::Io(e),
            other => RepositoryError::Download {
                url: other.url().unwrap_or_default(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
