//! State and default behaviour shared by every backend.
//!
//! The free functions here are the bodies of the [`Repository`] default
//! methods. Backends that override a method can still call them to run the
//! shared algorithm around their own steps.

use std::path::Path;
use std::sync::Arc;

use super::{DownloadOptions, DownloadResult, OriginType, Repository, RepositoryOptions, VersionIndex};
use crate::cache::{CacheEntry, CacheGateway, FsCacheGateway, ScratchAllocator};
use crate::config::RepoConfig;
use crate::transport::{FetchOptions, Headers, HttpTransport, Transport};
use crate::unpack::{ArchiveUnpacker, Unpacker};
use crate::{RepositoryError, Result};

/// Collaborators shared by all repositories of one install operation
pub struct RepositoryContext {
    pub cache: Arc<dyn CacheGateway>,
    pub transport: Arc<dyn Transport>,
    pub unpacker: Arc<dyn Unpacker>,
    pub scratch: ScratchAllocator,
    pub config: RepoConfig,
}

impl RepositoryContext {
    pub fn new(
        config: RepoConfig,
        cache: Arc<dyn CacheGateway>,
        transport: Arc<dyn Transport>,
        unpacker: Arc<dyn Unpacker>,
    ) -> Self {
        Self {
            cache,
            transport,
            unpacker,
            scratch: ScratchAllocator::new(),
            config,
        }
    }

    /// Filesystem cache, HTTP transport and archive unpacker built from `config`
    pub fn from_config(config: RepoConfig) -> Result<Self> {
        let cache = Arc::new(FsCacheGateway::from_config(&config));
        let transport = Arc::new(HttpTransport::from_config(&config)?);
        Ok(Self::new(config, cache, transport, Arc::new(ArchiveUnpacker::new())))
    }
}

/// Per-instance repository state
pub struct RepositoryBase {
    pub origin: OriginType,
    pub name: String,
    pub version: Option<String>,
    /// Location the backend knows without resolving anything
    pub url: Option<String>,
    /// Location of the last download or cache hit
    pub resolved_url: Option<String>,
    pub use_cache: bool,
    pub component: bool,
    pub ext_name: Option<String>,
    pub headers: Headers,
    /// Version index fetched during this instance's lifetime
    pub version_index: Option<VersionIndex>,
    pub context: Arc<RepositoryContext>,
}

impl RepositoryBase {
    pub fn new(origin: OriginType, options: RepositoryOptions, context: Arc<RepositoryContext>) -> Self {
        let mut headers = context.config.headers.clone();
        headers.extend(options.headers);

        Self {
            origin,
            name: options.name.unwrap_or_default(),
            version: options.version.filter(|v| !v.is_empty()),
            url: None,
            resolved_url: options.resolved_url,
            use_cache: options.use_cache.unwrap_or(context.config.use_cache),
            component: options.component.unwrap_or(context.config.component),
            ext_name: options.ext_name,
            headers,
            version_index: None,
            context,
        }
    }
}

async fn remove_download(file: &Path, target: &str) {
    log::debug!(target: target, "Removing {} after failed decompress", file.display());
    if let Err(e) = tokio::fs::remove_file(file).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!(target: target, "Failed to remove {}: {}", file.display(), e);
        }
    }
}

/// Fetch, unpack and record a package.
///
/// The URL is the override from `options`, else the resolved or static URL.
/// A file that fails to unpack is deleted so the next call downloads it again.
pub async fn download<R: Repository + ?Sized>(repo: &mut R, options: DownloadOptions) -> Result<DownloadResult> {
    let target = repo.origin().log_target();
    let url = options.url.clone().or_else(|| repo.resolved_url());
    repo.base_mut().resolved_url = url.clone();

    let url = url.ok_or_else(|| RepositoryError::UnknownSource("unknown download url".to_string()))?;
    log::debug!(target: target, "Begin download package {}...", url);

    let context = Arc::clone(&repo.base().context);
    let use_cache = options.use_cache.unwrap_or(repo.base().use_cache);
    let name = options.name.clone().unwrap_or_else(|| repo.name().to_string());
    let version = options
        .version
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| repo.version().map(str::to_string));

    let identity = repo.identity();
    let uri = context.cache.download_uri(&identity).unwrap_or_else(|| url.clone());

    let _guard = context.cache.download_lock(&uri).await;

    let fetch_options = FetchOptions {
        target: repo.download_cache_dir(),
        ext_name: repo.download_file_extension(&url),
        shasum: options.shasum.clone(),
        use_cache,
        headers: options.headers.clone().unwrap_or_else(|| repo.base().headers.clone()),
        progress: options.progress.clone(),
    };
    let fetched = context.transport.fetch(&url, fetch_options).await?;

    let scratch = context.scratch.allocate(&fetched.file);
    let dir = match context.unpacker.expand(&fetched.file, &scratch).await {
        Ok(dir) => dir,
        Err(e) => {
            remove_download(&fetched.file, target).await;
            return Err(RepositoryError::decompress(&fetched.file, e));
        }
    };

    if !fetched.from_cache {
        let entry = CacheEntry {
            uri,
            origin: repo.origin(),
            name: name.clone(),
            version: version.clone(),
            resolved: url.clone(),
            file: fetched.file.clone(),
            saved_at: None,
        };
        context.cache.save(&entry).await?;
        log::debug!(target: target, "Cached download info for {}", entry.uri);
    }

    Ok(DownloadResult {
        dir,
        resolved_url: url,
        from_cache: fetched.from_cache,
        name,
        version,
    })
}

/// Unpack a previously recorded download.
///
/// Any reason the record cannot be used is reported as
/// [`RepositoryError::CacheMiss`]; unusable records are evicted.
pub async fn read_from_cache<R: Repository + ?Sized>(repo: &mut R, want_latest: bool) -> Result<DownloadResult> {
    let target = repo.origin().log_target();
    let context = Arc::clone(&repo.base().context);
    let identity = repo.identity();

    let Some(entry) = context.cache.lookup(&identity, want_latest).await? else {
        return Err(RepositoryError::CacheMiss);
    };

    if !tokio::fs::try_exists(&entry.file).await.unwrap_or(false) {
        log::warn!(target: target, "Cached file {} is gone, dropping {}", entry.file.display(), entry.uri);
        context.cache.evict(&entry.uri).await?;
        return Err(RepositoryError::CacheMiss);
    }

    let scratch = context.scratch.allocate(&entry.file);
    match context.unpacker.expand(&entry.file, &scratch).await {
        Ok(dir) => {
            log::debug!(target: target, "Read from cache ok: {}", dir.display());
            repo.base_mut().resolved_url = Some(entry.resolved.clone());
            Ok(DownloadResult {
                dir,
                resolved_url: entry.resolved,
                from_cache: true,
                name: entry.name,
                version: entry.version,
            })
        }
        Err(e) => {
            log::warn!(target: target, "Read from cache failed for {}: {}", entry.uri, e);
            context.cache.evict(&entry.uri).await?;
            Err(RepositoryError::CacheMiss)
        }
    }
}

/// Cache first, then download.
///
/// The cache is skipped when caching is off or the caller pins a URL.
pub async fn acquire<R: Repository + ?Sized>(repo: &mut R, options: DownloadOptions) -> Result<DownloadResult> {
    let use_cache = options.use_cache.unwrap_or(repo.base().use_cache);

    if use_cache && options.url.is_none() {
        let want_latest = repo.version().is_none();
        match repo.read_from_cache(want_latest).await {
            Ok(result) => return Ok(result),
            Err(RepositoryError::CacheMiss) => {}
            Err(e) => return Err(e),
        }
    }

    repo.download(options).await
}

/// The metadata document listing every version of the package
pub async fn fetch_available_versions<R: Repository + ?Sized>(repo: &mut R) -> Result<VersionIndex> {
    let target = repo.origin().log_target();
    let url = repo
        .metadata_url()
        .ok_or_else(|| RepositoryError::UnknownSource("unknown meta data".to_string()))?;
    log::debug!(target: target, "Fetch meta data: {}...", url);

    if let Some(index) = &repo.base().version_index {
        return Ok(index.clone());
    }

    let context = Arc::clone(&repo.base().context);
    let identity = repo.identity();

    if let Some(index) = context.cache.lookup_version_index(&identity).await? {
        return Ok(index);
    }

    let data = context.transport.fetch_json(&url, &repo.base().headers).await?;
    let index = VersionIndex::new(url, data);

    if let Err(e) = context.cache.save_version_index(&identity, &index).await {
        log::warn!(target: target, "Failed to cache version index for {}: {}", identity.name, e);
    }
    repo.base_mut().version_index = Some(index.clone());

    Ok(index)
}
