//! Cache gateway: download records, version indexes and in-flight locks.
//!
//! The gateway maps a repository's identity to what is already on disk. It
//! never validates that a recorded file still exists; repositories check that
//! before trusting a hit and evict records whose file is gone.

mod fs;
mod scratch;
mod store;

pub use fs::FsCacheGateway;
pub use scratch::ScratchAllocator;
pub use store::JsonStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::repository::{OriginType, VersionIndex};
use crate::Result;

/// What the cache needs to know about a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryIdentity {
    pub origin: OriginType,
    pub component: bool,
    pub name: String,
    pub version: Option<String>,
    pub resolved_url: Option<String>,
}

impl RepositoryIdentity {
    /// Requested version, with an empty string treated as absent
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }
}

/// Record of a completed download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Lookup key
    pub uri: String,
    pub origin: OriginType,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// URL the file was downloaded from
    pub resolved: String,
    /// Downloaded file
    pub file: PathBuf,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait CacheGateway: Send + Sync {
    /// Directory downloads of this partition and origin are written to
    fn cache_dir(&self, component: bool, origin: OriginType) -> PathBuf;

    /// Stable key for a download, when the identity carries enough to build one
    fn download_uri(&self, identity: &RepositoryIdentity) -> Option<String>;

    /// Key `lookup` tries first
    fn lookup_key(&self, identity: &RepositoryIdentity) -> Option<String> {
        self.download_uri(identity)
            .or_else(|| identity.resolved_url.clone())
    }

    /// Find a recorded download; `want_latest` allows picking the newest
    /// version when the identity names none.
    async fn lookup(&self, identity: &RepositoryIdentity, want_latest: bool) -> Result<Option<CacheEntry>>;

    async fn save(&self, entry: &CacheEntry) -> Result<()>;

    /// Drop the record stored under `uri`. Missing records are not an error.
    async fn evict(&self, uri: &str) -> Result<()>;

    /// A fresh version index, if one is stored
    async fn lookup_version_index(&self, identity: &RepositoryIdentity) -> Result<Option<VersionIndex>>;

    async fn save_version_index(&self, identity: &RepositoryIdentity, index: &VersionIndex) -> Result<()>;

    /// Serialize downloads sharing `key`; the guard is held until dropped
    async fn download_lock(&self, key: &str) -> OwnedMutexGuard<()>;
}

/// Per-key async locks, pruned as they fall out of use
#[derive(Debug, Default)]
pub struct InflightLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InflightLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the map holds these: nobody owns or waits on them
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
