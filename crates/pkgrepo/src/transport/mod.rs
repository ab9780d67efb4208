//! Fetching remote files and documents.
//!
//! Repositories never talk to the network directly; they go through a
//! [`Transport`]. [`HttpTransport`] is the reqwest-backed implementation.

mod checksum;
mod http;

pub use checksum::{verify_checksum, verify_file, ChecksumType};
pub use http::HttpTransport;

use async_trait::async_trait;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;

/// Request headers, in insertion order
pub type Headers = IndexMap<String, String>;

/// Progress callback: `(downloaded_bytes, total_bytes)`; total is 0 when unknown
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Options for a single [`Transport::fetch`]
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Directory the downloaded file is written into
    pub target: PathBuf,
    /// Extension given to the downloaded file, with its leading dot
    pub ext_name: String,
    /// Expected hex digest; the algorithm follows from its length
    pub shasum: Option<String>,
    /// Reuse a file already present in `target`
    pub use_cache: bool,
    pub headers: Headers,
    pub progress: Option<ProgressFn>,
}

impl FetchOptions {
    pub fn new<P: AsRef<Path>>(target: P) -> Self {
        Self {
            target: target.as_ref().to_path_buf(),
            use_cache: true,
            ..Self::default()
        }
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("target", &self.target)
            .field("ext_name", &self.ext_name)
            .field("shasum", &self.shasum)
            .field("use_cache", &self.use_cache)
            .field("headers", &self.headers)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// A file produced by [`Transport::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub file: PathBuf,
    /// The file was already on disk and no request was made
    pub from_cache: bool,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` into `options.target`
    async fn fetch(&self, url: &str, options: FetchOptions) -> Result<FetchedFile>;

    /// Fetch and parse a JSON document
    async fn fetch_json(&self, url: &str, headers: &Headers) -> Result<serde_json::Value>;
}
