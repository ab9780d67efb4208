use async_trait::async_trait;
use chrono::Utc;
use pkgrepo_semver::Semver;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use super::{CacheEntry, CacheGateway, InflightLocks, JsonStore, RepositoryIdentity};
use crate::config::RepoConfig;
use crate::repository::{OriginType, VersionIndex};
use crate::Result;

/// Cache gateway on a local directory.
///
/// Layout under the root:
/// - `component/<origin>/` and `common/<origin>/` hold downloaded files
/// - `.index/` holds one JSON record per download
/// - `.versions/` holds version indexes, fresh for a configurable TTL
pub struct FsCacheGateway {
    root: PathBuf,
    entries: JsonStore,
    versions: JsonStore,
    version_ttl: Duration,
    inflight: InflightLocks,
}

impl FsCacheGateway {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            entries: JsonStore::new(root.join(".index")),
            versions: JsonStore::new(root.join(".versions")),
            version_ttl: Duration::from_secs(crate::config::DEFAULT_VERSION_INDEX_TTL),
            inflight: InflightLocks::new(),
            root,
        }
    }

    pub fn from_config(config: &RepoConfig) -> Self {
        Self::new(&config.cache_dir).with_version_ttl(config.version_index_ttl())
    }

    pub fn with_version_ttl(mut self, ttl: Duration) -> Self {
        self.version_ttl = ttl;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_index_key(identity: &RepositoryIdentity) -> String {
        format!("{}-{}", identity.origin, identity.name)
    }

    /// Pick among the recorded downloads of the same package
    async fn lookup_by_name(&self, identity: &RepositoryIdentity, want_latest: bool) -> Result<Option<CacheEntry>> {
        let candidates: Vec<CacheEntry> = self
            .entries
            .list::<CacheEntry>()
            .await?
            .into_iter()
            .filter(|entry| entry.origin == identity.origin && entry.name == identity.name)
            .filter(|entry| entry.version.as_deref().is_some_and(|v| !v.is_empty()))
            .collect();

        if candidates.is_empty() {
            return Ok(None);
        }

        let versions: Vec<&str> = candidates
            .iter()
            .filter_map(|entry| entry.version.as_deref())
            .collect();

        let chosen = match identity.version() {
            None if want_latest => Semver::rsort(&versions).into_iter().next(),
            None => None,
            Some(range) if Semver::valid_range(range) => Semver::max_satisfying(&versions, range),
            Some(_) => None,
        };

        Ok(chosen.and_then(|version| {
            candidates
                .into_iter()
                .find(|entry| entry.version.as_deref() == Some(version.as_str()))
        }))
    }
}

#[async_trait]
impl CacheGateway for FsCacheGateway {
    fn cache_dir(&self, component: bool, origin: OriginType) -> PathBuf {
        let scope = if component { "component" } else { "common" };
        self.root.join(scope).join(origin.as_str())
    }

    fn download_uri(&self, identity: &RepositoryIdentity) -> Option<String> {
        let version = identity.version()?;
        if identity.name.is_empty() {
            return None;
        }
        Some(format!("{}:{}@{}", identity.origin, identity.name, version))
    }

    async fn lookup(&self, identity: &RepositoryIdentity, want_latest: bool) -> Result<Option<CacheEntry>> {
        if let Some(key) = self.lookup_key(identity) {
            if let Some(entry) = self.entries.read::<CacheEntry>(&key).await? {
                return Ok(Some(entry));
            }
        }

        if identity.name.is_empty() {
            return Ok(None);
        }

        self.lookup_by_name(identity, want_latest).await
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        let mut entry = entry.clone();
        entry.saved_at.get_or_insert_with(Utc::now);
        self.entries.write(&entry.uri, &entry).await
    }

    async fn evict(&self, uri: &str) -> Result<()> {
        if self.entries.remove(uri).await? {
            log::debug!("Evicted cache record {}", uri);
        }
        Ok(())
    }

    async fn lookup_version_index(&self, identity: &RepositoryIdentity) -> Result<Option<VersionIndex>> {
        let key = Self::version_index_key(identity);
        let Some(index) = self.versions.read::<VersionIndex>(&key).await? else {
            return Ok(None);
        };

        let age = Utc::now().signed_duration_since(index.fetched_at);
        match age.to_std() {
            Ok(age) if age > self.version_ttl => {
                log::debug!("Version index for {} is stale ({}s old)", key, age.as_secs());
                Ok(None)
            }
            _ => Ok(Some(index)),
        }
    }

    async fn save_version_index(&self, identity: &RepositoryIdentity, index: &VersionIndex) -> Result<()> {
        self.versions
            .write(&Self::version_index_key(identity), index)
            .await
    }

    async fn download_lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.inflight.acquire(key).await
    }
}
