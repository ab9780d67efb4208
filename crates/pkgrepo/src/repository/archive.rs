use async_trait::async_trait;
use std::sync::Arc;

use super::{
    DependencyEndpoint, InstallSource, OriginType, Repository, RepositoryBase, RepositoryContext, RepositoryOptions,
};
use crate::util::name_from_url;
use crate::{RepositoryError, Result};

/// A package published as an archive at a fixed URL
pub struct ArchiveRepository {
    base: RepositoryBase,
}

impl ArchiveRepository {
    pub fn new(url: &str, options: RepositoryOptions, context: Arc<RepositoryContext>) -> Result<Self> {
        url::Url::parse(url)
            .map_err(|e| RepositoryError::UnknownSource(format!("invalid archive url \"{}\": {}", url, e)))?;

        let mut base = RepositoryBase::new(OriginType::Archive, options, context);
        base.url = Some(url.to_string());
        if base.name.is_empty() {
            base.name = name_from_url(url);
        }

        Ok(Self { base })
    }
}

#[async_trait]
impl Repository for ArchiveRepository {
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
            origin: OriginType::Archive,
            path: self.base.url.clone(),
        }
    }

    fn dependency_endpoint(&self) -> Option<DependencyEndpoint> {
        None
    }
}
