use async_trait::async_trait;
use pkgrepo_semver::Semver;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{
    base, DependencyEndpoint, DownloadOptions, DownloadResult, InstallSource, OriginType, Repository, RepositoryBase,
    RepositoryContext, RepositoryOptions, UpdateInfo, VersionList, VersionQuery, VersionRecord,
};
use crate::{RepositoryError, Result};

/// Version fields kept as record metadata
const METADATA_FIELDS: &[&str] = &["description", "license", "author", "deprecated", "homepage"];

/// A package served by an npm-style registry
pub struct RegistryRepository {
    base: RepositoryBase,
    registry: String,
    /// Record chosen by the last version resolution
    selected: Option<VersionRecord>,
}

impl RegistryRepository {
    pub fn new(name: &str, options: RepositoryOptions, context: Arc<RepositoryContext>) -> Result<Self> {
        if name.is_empty() {
            return Err(RepositoryError::UnknownSource("registry package without a name".to_string()));
        }

        let registry = context.config.registry.trim_end_matches('/').to_string();
        let mut base = RepositoryBase::new(OriginType::Registry, options, context);
        base.name = name.to_string();

        Ok(Self {
            base,
            registry,
            selected: None,
        })
    }

    pub fn with_registry(mut self, registry: &str) -> Self {
        self.registry = registry.trim_end_matches('/').to_string();
        self
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn selected(&self) -> Option<&VersionRecord> {
        self.selected.as_ref()
    }
}

/// Path segment for a package name; the scope `@` stays readable
fn encode_name(name: &str) -> String {
    match name.strip_prefix('@') {
        Some(scoped) => format!("@{}", urlencoding::encode(scoped)),
        None => urlencoding::encode(name).into_owned(),
    }
}

fn record_from_manifest(version: &str, manifest: &Value) -> VersionRecord {
    let mut record = VersionRecord::new(version);
    let dist = &manifest["dist"];

    if let Some(tarball) = dist["tarball"].as_str() {
        record = record.with_url(tarball);
    }
    if let Some(shasum) = dist["shasum"].as_str() {
        record = record.with_shasum(shasum);
    }

    let metadata: Map<String, Value> = METADATA_FIELDS
        .iter()
        .filter_map(|field| manifest.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect();
    if !metadata.is_empty() {
        record = record.with_metadata(Value::Object(metadata));
    }

    record
}

/// Read versions and dist-tags from a registry package document.
///
/// Versions keep document order. Tags copy the record of the version they
/// point at, or carry only the version when it is not listed.
pub fn parse_version_list(doc: &Value) -> VersionList {
    let versions: Vec<VersionRecord> = doc["versions"]
        .as_object()
        .map(|versions| {
            versions
                .iter()
                .map(|(version, manifest)| record_from_manifest(version, manifest))
                .collect()
        })
        .unwrap_or_default();

    let tags = doc["dist-tags"]
        .as_object()
        .map(|tags| {
            tags.iter()
                .filter_map(|(tag, version)| {
                    let version = version.as_str()?;
                    let record = match versions.iter().find(|r| r.version == version) {
                        Some(record) => VersionRecord {
                            tag: Some(tag.clone()),
                            ..record.clone()
                        },
                        None => VersionRecord::tagged(tag.as_str(), version),
                    };
                    Some(record)
                })
                .collect()
        })
        .unwrap_or_default();

    VersionList { versions, tags }
}

#[async_trait]
impl Repository for RegistryRepository {
    fn base(&self) -> &RepositoryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RepositoryBase {
        &mut self.base
    }

    fn repository_url(&self) -> Option<String> {
        Some(self.registry.clone())
    }

    fn metadata_url(&self) -> Option<String> {
        Some(format!("{}/{}", self.registry, encode_name(&self.base.name)))
    }

    fn install_source(&self) -> InstallSource {
        let version = self
            .selected
            .as_ref()
            .map(|r| r.version.as_str())
            .or(self.base.version.as_deref());

        InstallSource {
            origin: OriginType::Registry,
            path: Some(match version {
                Some(version) => format!("{}@{}", self.base.name, version),
                None => self.base.name.clone(),
            }),
        }
    }

    fn dependency_endpoint(&self) -> Option<DependencyEndpoint> {
        Some(DependencyEndpoint {
            origin: OriginType::Registry,
            value: Some(self.registry.clone()),
        })
    }

    async fn fetch_all_versions(&mut self) -> Result<VersionList> {
        let index = self.fetch_available_versions().await?;
        Ok(parse_version_list(&index.data))
    }

    async fn fetch_version_metadata(&mut self, query: VersionQuery) -> Result<VersionQuery> {
        let list = self.fetch_all_versions().await?;
        let requested = if query.version.is_empty() {
            self.base.version.clone()
        } else {
            Some(query.version.clone())
        };

        let record = self.select_fetch_version(requested.as_deref(), &list.versions, &list.tags)?;
        log::debug!(
            target: OriginType::Registry.log_target(),
            "Resolved {}@{} to {}",
            self.base.name,
            requested.as_deref().unwrap_or(""),
            record.version
        );

        if record.url.is_some() {
            self.base.resolved_url = record.url.clone();
        }
        let resolved = VersionQuery {
            version: record.version.clone(),
            url: record.url.clone(),
            shasum: record.shasum.clone(),
        };
        self.selected = Some(record);

        Ok(resolved)
    }

    async fn download(&mut self, mut options: DownloadOptions) -> Result<DownloadResult> {
        if options.url.is_none() {
            if self.selected.is_none() {
                self.fetch_version_metadata(VersionQuery::default()).await?;
            }
            if let Some(selected) = self.selected.clone() {
                options.url = options.url.or(selected.url);
                options.shasum = options.shasum.or(selected.shasum);
                options.version = options.version.or(Some(selected.version));
            }
        }

        base::download(self, options).await
    }

    async fn fetch_update_info(&mut self, current: &str) -> Result<UpdateInfo> {
        let list = self.fetch_all_versions().await?;

        let latest = match list.tags.iter().find(|t| t.tag.as_deref() == Some("latest")) {
            Some(tagged) => tagged.version.clone(),
            None => self.select_fetch_version(Some("*"), &list.versions, &[])?.version,
        };

        let versions: Vec<&str> = list.versions.iter().map(|r| r.version.as_str()).collect();
        let wanted = Semver::max_satisfying(&versions, &format!("^{}", current));

        Ok(UpdateInfo {
            current: current.to_string(),
            latest,
            wanted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "name": "widget",
            "dist-tags": {"latest": "1.1.0", "next": "2.0.0-rc.1", "legacy": "0.1.0"},
            "versions": {
                "1.0.0": {
                    "dist": {"tarball": "https://registry.example.com/widget/-/widget-1.0.0.tgz", "shasum": "aaa"},
                    "license": "MIT"
                },
                "1.1.0": {
                    "dist": {"tarball": "https://registry.example.com/widget/-/widget-1.1.0.tgz", "shasum": "bbb"},
                    "deprecated": "use 2.x"
                },
                "2.0.0-rc.1": {
                    "dist": {"tarball": "https://registry.example.com/widget/-/widget-2.0.0-rc.1.tgz"}
                }
            }
        })
    }

    #[test]
    fn test_encode_name() {
        assert_eq!(encode_name("widget"), "widget");
        assert_eq!(encode_name("@scope/widget"), "@scope%2Fwidget");
    }

    #[test]
    fn test_parse_version_list() {
        let list = parse_version_list(&document());

        let versions: Vec<&str> = list.versions.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["1.0.0", "1.1.0", "2.0.0-rc.1"]);
        assert_eq!(list.versions[0].shasum.as_deref(), Some("aaa"));
        assert_eq!(list.versions[0].metadata, Some(json!({"license": "MIT"})));
        assert_eq!(list.versions[2].shasum, None);

        let latest = list.tags.iter().find(|t| t.tag.as_deref() == Some("latest")).unwrap();
        assert_eq!(latest.version, "1.1.0");
        assert_eq!(latest.url.as_deref(), Some("https://registry.example.com/widget/-/widget-1.1.0.tgz"));

        let legacy = list.tags.iter().find(|t| t.tag.as_deref() == Some("legacy")).unwrap();
        assert_eq!(legacy.version, "0.1.0");
        assert_eq!(legacy.url, None);
    }

    #[test]
    fn test_parse_version_list_without_versions() {
        let list = parse_version_list(&json!({"error": "not found"}));
        assert!(list.versions.is_empty());
        assert!(list.tags.is_empty());
    }
}
