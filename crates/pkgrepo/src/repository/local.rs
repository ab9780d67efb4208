use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    DependencyEndpoint, DownloadOptions, DownloadResult, InstallSource, OriginType, Repository, RepositoryBase,
    RepositoryContext, RepositoryOptions,
};
use crate::unpack::{mirror_directory, reset_directory};
use crate::util::{md5_hex, resolve_path};
use crate::{RepositoryError, Result};

/// A package on the local filesystem: a directory or an archive file.
///
/// Local packages are never recorded in the cache index. Each source path
/// owns one slot, `<cache dir>/<md5 of the absolute path>`, which is
/// cleared and refilled on every download.
pub struct LocalRepository {
    base: RepositoryBase,
    /// Path as given by the caller
    source: String,
    resolved_path: PathBuf,
}

impl LocalRepository {
    /// Resolve `source` against the current working directory
    pub fn new(source: &str, options: RepositoryOptions, context: Arc<RepositoryContext>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::with_cwd(source, &cwd, options, context))
    }

    pub fn with_cwd(source: &str, cwd: &Path, options: RepositoryOptions, context: Arc<RepositoryContext>) -> Self {
        let resolved_path = resolve_path(cwd, source);
        let mut base = RepositoryBase::new(OriginType::Local, options, context);

        base.url = Some(
            base.resolved_url
                .clone()
                .unwrap_or_else(|| resolved_path.to_string_lossy().into_owned()),
        );
        if base.name.is_empty() {
            base.name = resolved_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }

        Self {
            base,
            source: source.to_string(),
            resolved_path,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn resolved_path(&self) -> &Path {
        &self.resolved_path
    }

    /// Slot the package is materialized into
    pub fn slot_dir(&self, path: &str) -> PathBuf {
        self.download_cache_dir().join(md5_hex(path))
    }
}

async fn reset_slot(slot: &Path) -> Result<()> {
    let slot = slot.to_path_buf();
    tokio::task::spawn_blocking(move || reset_directory(&slot))
        .await
        .map_err(|e| RepositoryError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

#[async_trait]
impl Repository for LocalRepository {
    fn base(&self) -> &RepositoryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RepositoryBase {
        &mut self.base
    }

    fn needs_resolve(&self) -> bool {
        false
    }

    fn install_source(&self) -> InstallSource {
        InstallSource {
            origin: OriginType::Local,
            path: Some(format!("{}:{}", OriginType::Local, self.source)),
        }
    }

    fn dependency_endpoint(&self) -> Option<DependencyEndpoint> {
        None
    }

    async fn download(&mut self, _options: DownloadOptions) -> Result<DownloadResult> {
        let target = OriginType::Local.log_target();
        let path = self
            .resolved_url()
            .ok_or_else(|| RepositoryError::UnknownSource("unknown file path".to_string()))?;
        log::debug!(target: target, "Begin load package from local: {}...", path);

        let metadata = tokio::fs::metadata(&path).await?;
        let slot = self.slot_dir(&path);
        let context = Arc::clone(&self.base.context);
        let _guard = context.cache.download_lock(&slot.to_string_lossy()).await;

        let dir = if metadata.is_dir() {
            let (source, dest) = (PathBuf::from(&path), slot.clone());
            let copied = tokio::task::spawn_blocking(move || {
                reset_directory(&dest)?;
                mirror_directory(&source, &dest)
            })
            .await
            .map_err(|e| RepositoryError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
            log::debug!(target: target, "Copied {} files into {}", copied, slot.display());
            slot
        } else if metadata.is_file() {
            reset_slot(&slot).await?;
            context.unpacker.expand(Path::new(&path), &slot).await?
        } else {
            return Err(RepositoryError::UnknownSource(format!(
                "{} is neither a file nor a directory",
                path
            )));
        };

        self.base.resolved_url = Some(path.clone());

        Ok(DownloadResult {
            dir,
            resolved_url: path,
            from_cache: false,
            name: self.base.name.clone(),
            version: self.base.version.clone(),
        })
    }

    /// Local sources are always read fresh
    async fn acquire(&mut self, options: DownloadOptions) -> Result<DownloadResult> {
        self.download(options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FsCacheGateway;
    use crate::config::RepoConfig;
    use crate::transport::HttpTransport;
    use crate::unpack::ArchiveUnpacker;
    use tempfile::TempDir;

    fn context(cache_root: &Path) -> Arc<RepositoryContext> {
        let config = RepoConfig::with_cache_dir(cache_root);
        Arc::new(RepositoryContext::new(
            config.clone(),
            Arc::new(FsCacheGateway::new(cache_root)),
            Arc::new(HttpTransport::from_config(&config).unwrap()),
            Arc::new(ArchiveUnpacker::new()),
        ))
    }

    #[test]
    fn test_construction() {
        let cache = TempDir::new().unwrap();
        let repo = LocalRepository::with_cwd(
            "../libs/widget",
            Path::new("/work/app"),
            RepositoryOptions::new(),
            context(cache.path()),
        );

        assert_eq!(repo.name(), "widget");
        assert_eq!(repo.resolved_path(), Path::new("/work/libs/widget"));
        assert_eq!(repo.resolved_url().as_deref(), Some("/work/libs/widget"));
        assert!(!repo.needs_resolve());
        assert_eq!(repo.dependency_endpoint(), None);
        assert_eq!(repo.install_source().path.as_deref(), Some("local:../libs/widget"));
    }

    #[test]
    fn test_explicit_name_is_kept() {
        let cache = TempDir::new().unwrap();
        let repo = LocalRepository::with_cwd(
            "./widget",
            Path::new("/work"),
            RepositoryOptions::new().with_name("my-widget"),
            context(cache.path()),
        );
        assert_eq!(repo.name(), "my-widget");
    }

    #[test]
    fn test_slot_is_under_local_cache_dir() {
        let cache = TempDir::new().unwrap();
        let repo = LocalRepository::with_cwd("pkg", Path::new("/work"), RepositoryOptions::new(), context(cache.path()));

        let slot = repo.slot_dir("/work/pkg");
        assert_eq!(slot, cache.path().join("component/local").join(md5_hex("/work/pkg")));
    }

    #[tokio::test]
    async fn test_download_missing_path_is_io_error() {
        let cache = TempDir::new().unwrap();
        let mut repo = LocalRepository::with_cwd(
            "does-not-exist",
            cache.path(),
            RepositoryOptions::new(),
            context(cache.path()),
        );

        let err = repo.download(DownloadOptions::new()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Io(_)));
    }
}
