use async_trait::async_trait;
use std::path::PathBuf;

use super::base;
use super::selector::{self, FetchVersionOutcome};
use super::{
    DependencyEndpoint, DownloadOptions, DownloadResult, InstallSource, OriginType, RepositoryBase, UpdateInfo,
    VersionIndex, VersionList, VersionQuery, VersionRecord,
};
use crate::cache::RepositoryIdentity;
use crate::util::file_ext_name;
use crate::{RepositoryError, Result};

/// A package origin.
///
/// One instance is created per package reference and driven through
/// resolve, metadata, then download or cache read. Every method has a
/// default; backends hold a [`RepositoryBase`] and override what differs.
#[async_trait]
pub trait Repository: Send + Sync {
    fn base(&self) -> &RepositoryBase;

    fn base_mut(&mut self) -> &mut RepositoryBase;

    fn origin(&self) -> OriginType {
        self.base().origin
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    /// Requested version or tag; `None` when unspecified
    fn version(&self) -> Option<&str> {
        self.base().version.as_deref()
    }

    /// Whether version metadata must be fetched before downloading
    fn needs_resolve(&self) -> bool {
        true
    }

    /// Last resolved location, else the static one
    fn resolved_url(&self) -> Option<String> {
        let base = self.base();
        base.resolved_url.clone().or_else(|| base.url.clone())
    }

    /// Base URL of the repository serving this package
    fn repository_url(&self) -> Option<String> {
        None
    }

    /// Where the version index of this package lives
    fn metadata_url(&self) -> Option<String> {
        None
    }

    fn install_source(&self) -> InstallSource {
        InstallSource {
            origin: self.origin(),
            path: None,
        }
    }

    /// `None` means dependencies carry no origin hint
    fn dependency_endpoint(&self) -> Option<DependencyEndpoint> {
        Some(DependencyEndpoint {
            origin: self.origin(),
            value: None,
        })
    }

    fn download_cache_dir(&self) -> PathBuf {
        let base = self.base();
        base.context.cache.cache_dir(base.component, base.origin)
    }

    fn download_file_extension(&self, url: &str) -> String {
        self.base()
            .ext_name
            .clone()
            .unwrap_or_else(|| file_ext_name(url))
    }

    fn identity(&self) -> RepositoryIdentity {
        RepositoryIdentity {
            origin: self.origin(),
            component: self.base().component,
            name: self.name().to_string(),
            version: self.version().map(str::to_string),
            resolved_url: self.resolved_url(),
        }
    }

    async fn read_from_cache(&mut self, want_latest: bool) -> Result<DownloadResult> {
        base::read_from_cache(self, want_latest).await
    }

    async fn download(&mut self, options: DownloadOptions) -> Result<DownloadResult> {
        base::download(self, options).await
    }

    /// Cache read with a download fallback
    async fn acquire(&mut self, options: DownloadOptions) -> Result<DownloadResult> {
        base::acquire(self, options).await
    }

    async fn fetch_available_versions(&mut self) -> Result<VersionIndex> {
        base::fetch_available_versions(self).await
    }

    async fn fetch_all_versions(&mut self) -> Result<VersionList> {
        Err(RepositoryError::Unsupported(format!(
            "listing versions of {} packages",
            self.origin()
        )))
    }

    async fn fetch_version_metadata(&mut self, query: VersionQuery) -> Result<VersionQuery> {
        Ok(query)
    }

    async fn fetch_update_info(&mut self, _current: &str) -> Result<UpdateInfo> {
        Err(RepositoryError::Unsupported(format!(
            "update is not available for {} packages",
            self.origin()
        )))
    }

    fn select_fetch_version(
        &self,
        requested: Option<&str>,
        versions: &[VersionRecord],
        tags: &[VersionRecord],
    ) -> FetchVersionOutcome {
        if let Some(request) = requested.filter(|r| !r.is_empty()) {
            log::debug!(
                target: self.origin().log_target(),
                "Fetch {} from {} versions",
                request,
                versions.len()
            );
        }
        selector::select_fetch_version(self.name(), requested, versions, tags)
    }
}
