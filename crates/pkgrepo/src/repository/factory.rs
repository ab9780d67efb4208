use std::str::FromStr;
use std::sync::Arc;

use super::{
    ArchiveRepository, LocalRepository, OriginType, RegistryRepository, Repository, RepositoryContext,
    RepositoryOptions,
};
use crate::{RepositoryError, Result};

/// A package as named by the caller, before a backend is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub origin: OriginType,
    /// Path, URL or registry name, depending on the origin
    pub source: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub use_cache: Option<bool>,
    pub component: Option<bool>,
}

impl PackageReference {
    pub fn new(origin: OriginType, source: impl Into<String>) -> Self {
        Self {
            origin,
            source: source.into(),
            name: None,
            version: None,
            use_cache: None,
            component: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
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

    /// Parse a reference written on the command line or in a manifest.
    ///
    /// - `local:<path>`, or a path starting with `.` or `/`
    /// - `http(s)://...` for an archive
    /// - `vcs:...`, `git+...` or `git://...`
    /// - `<name>[@<version or range>]`, scoped names included
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(RepositoryError::UnknownSource("empty package reference".to_string()));
        }

        if let Some(path) = reference.strip_prefix("local:") {
            return Ok(Self::new(OriginType::Local, path));
        }
        if reference.starts_with('.') || reference.starts_with('/') {
            return Ok(Self::new(OriginType::Local, reference));
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(Self::new(OriginType::Archive, reference));
        }
        if let Some(rest) = reference.strip_prefix("vcs:") {
            return Ok(Self::new(OriginType::Vcs, rest));
        }
        if reference.starts_with("git+") || reference.starts_with("git://") {
            return Ok(Self::new(OriginType::Vcs, reference));
        }

        // The leading `@` of a scoped name is not a version separator
        let (name, version) = match reference.rfind('@') {
            Some(idx) if idx > 0 => (&reference[..idx], Some(&reference[idx + 1..])),
            _ => (reference, None),
        };

        let mut parsed = Self::new(OriginType::Registry, name).with_name(name);
        parsed.version = version.filter(|v| !v.is_empty()).map(str::to_string);
        Ok(parsed)
    }

    fn options(&self) -> RepositoryOptions {
        RepositoryOptions {
            name: self.name.clone(),
            version: self.version.clone(),
            use_cache: self.use_cache,
            component: self.component,
            ..RepositoryOptions::default()
        }
    }
}

impl FromStr for PackageReference {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Build the backend for `reference`
pub fn create_repository(
    reference: PackageReference,
    context: Arc<RepositoryContext>,
) -> Result<Box<dyn Repository>> {
    let options = reference.options();

    let repository: Box<dyn Repository> = match reference.origin {
        OriginType::Local => Box::new(LocalRepository::new(&reference.source, options, context)?),
        OriginType::Archive => Box::new(ArchiveRepository::new(&reference.source, options, context)?),
        OriginType::Registry => Box::new(RegistryRepository::new(&reference.source, options, context)?),
        OriginType::Vcs => {
            return Err(RepositoryError::Unsupported(format!(
                "no backend for vcs source {}",
                reference.source
            )))
        }
    };

    log::debug!(
        target: reference.origin.log_target(),
        "Created {} repository for {}",
        reference.origin,
        reference.source
    );
    Ok(repository)
}
