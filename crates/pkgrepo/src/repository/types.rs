use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::OriginType;
use crate::transport::{Headers, ProgressFn};

/// One fetchable version of a package, or a tag pointing at one
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Resolved download location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,

    /// Free-form data such as author, license or deprecation notice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl VersionRecord {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// A tag entry for `version`
    pub fn tagged(tag: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_shasum(mut self, shasum: impl Into<String>) -> Self {
        self.shasum = Some(shasum.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// All versions and tags a backend knows for a package, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionList {
    pub versions: Vec<VersionRecord>,
    pub tags: Vec<VersionRecord>,
}

/// Raw metadata document describing every version of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionIndex {
    pub url: String,
    pub data: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl VersionIndex {
    pub fn new(url: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            data,
            fetched_at: Utc::now(),
        }
    }
}

/// Per-call overrides for [`Repository::download`](super::Repository::download)
#[derive(Clone, Default)]
pub struct DownloadOptions {
    pub url: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub shasum: Option<String>,
    pub headers: Option<Headers>,
    pub use_cache: Option<bool>,
    pub progress: Option<ProgressFn>,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_shasum(mut self, shasum: impl Into<String>) -> Self {
        self.shasum = Some(shasum.into());
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("shasum", &self.shasum)
            .field("headers", &self.headers)
            .field("use_cache", &self.use_cache)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// A package tree ready on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub dir: PathBuf,
    pub resolved_url: String,
    pub from_cache: bool,
    pub name: String,
    pub version: Option<String>,
}

/// How an installed package records where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSource {
    #[serde(rename = "type")]
    pub origin: OriginType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Where the dependencies of a downloaded package should be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEndpoint {
    #[serde(rename = "type")]
    pub origin: OriginType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub current: String,
    pub latest: String,
    /// Newest version compatible with `current`
    pub wanted: Option<String>,
}

impl UpdateInfo {
    pub fn has_update(&self) -> bool {
        self.latest != self.current
    }
}

/// Version metadata query, filled in by backends that can resolve it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionQuery {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
}

impl VersionQuery {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }
}

/// Construction options shared by every backend
#[derive(Debug, Clone, Default)]
pub struct RepositoryOptions {
    pub name: Option<String>,
    pub version: Option<String>,
    pub resolved_url: Option<String>,
    /// Falls back to the configured default
    pub use_cache: Option<bool>,
    /// Falls back to the configured default
    pub component: Option<bool>,
    pub headers: Headers,
    pub ext_name: Option<String>,
}

impl RepositoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_resolved_url(mut self, url: impl Into<String>) -> Self {
        self.resolved_url = Some(url.into());
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    pub fn with_component(mut self, component: bool) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_ext_name(mut self, ext_name: impl Into<String>) -> Self {
        self.ext_name = Some(ext_name.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
