use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::error::{RepositoryError, Result};

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Seconds a cached version index stays fresh
pub const DEFAULT_VERSION_INDEX_TTL: u64 = 300;

/// Resolved configuration for repositories and their collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoConfig {
    /// Root of the on-disk cache
    pub cache_dir: PathBuf,

    /// Default for `use_cache` when a repository is not told otherwise
    pub use_cache: bool,

    /// Base URL of the package registry
    pub registry: String,

    /// Freshness of cached version indexes, in seconds
    pub version_index_ttl: u64,

    /// Headers sent with every request
    pub headers: IndexMap<String, String>,

    /// Default cache partition for new repositories
    pub component: bool,

    /// Request timeout in seconds
    pub http_timeout: u64,

    pub http_retries: u32,

    /// Proxy URL for every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Extra PEM root certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cafile: Option<PathBuf>,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            cache_dir: ConfigLoader::new(false).default_cache_dir(),
            use_cache: true,
            registry: DEFAULT_REGISTRY.to_string(),
            version_index_ttl: DEFAULT_VERSION_INDEX_TTL,
            headers: IndexMap::new(),
            component: true,
            http_timeout: 30,
            http_retries: 3,
            proxy: None,
            cafile: None,
            sources: HashMap::new(),
        }
    }
}

impl RepoConfig {
    /// Defaults with the cache rooted at `cache_dir`
    pub fn with_cache_dir<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Build configuration from defaults, the project file and the environment
    pub fn build<P: AsRef<Path>>(project_dir: Option<P>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        for key in Self::config_keys() {
            config.sources.insert(key.to_string(), ConfigSource::Default);
        }

        if let Some(dir) = &project_dir {
            let raw = loader.load_project_config(dir)?;
            config.merge_raw_config(raw, &loader, ConfigSource::Project)?;
        }

        if use_environment {
            config.apply_env_overrides(&loader);
        }

        Ok(config)
    }

    fn config_keys() -> [&'static str; 10] {
        [
            "cache-dir",
            "use-cache",
            "registry",
            "version-index-ttl",
            "headers",
            "component",
            "http-timeout",
            "http-retries",
            "proxy",
            "cafile",
        ]
    }

    fn merge_raw_config(
        &mut self,
        raw: RawConfig,
        loader: &ConfigLoader,
        source: ConfigSource,
    ) -> Result<()> {
        if let Some(dir) = raw.cache_dir {
            self.cache_dir = loader.expand_path(&dir);
            self.sources.insert("cache-dir".to_string(), source.clone());
        }
        if let Some(use_cache) = raw.use_cache {
            self.use_cache = use_cache;
            self.sources.insert("use-cache".to_string(), source.clone());
        }
        if let Some(registry) = raw.registry {
            self.registry = normalize_registry(&registry)?;
            self.sources.insert("registry".to_string(), source.clone());
        }
        if let Some(ttl) = raw.version_index_ttl {
            self.version_index_ttl = ttl;
            self.sources.insert("version-index-ttl".to_string(), source.clone());
        }
        if let Some(headers) = raw.headers {
            self.headers.extend(headers);
            self.sources.insert("headers".to_string(), source.clone());
        }
        if let Some(component) = raw.component {
            self.component = component;
            self.sources.insert("component".to_string(), source.clone());
        }
        if let Some(timeout) = raw.http_timeout {
            self.http_timeout = timeout;
            self.sources.insert("http-timeout".to_string(), source.clone());
        }
        if let Some(retries) = raw.http_retries {
            self.http_retries = retries;
            self.sources.insert("http-retries".to_string(), source.clone());
        }
        if let Some(proxy) = raw.proxy {
            self.proxy = Some(proxy);
            self.sources.insert("proxy".to_string(), source.clone());
        }
        if let Some(cafile) = raw.cafile {
            self.cafile = Some(loader.expand_path(&cafile));
            self.sources.insert("cafile".to_string(), source);
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) {
        if let Some(dir) = loader.get_env_config("cache-dir") {
            self.cache_dir = loader.expand_path(&dir);
            self.sources.insert(
                "cache-dir".to_string(),
                ConfigSource::Environment("PKGREPO_CACHE_DIR".to_string()),
            );
        }

        if let Some(registry) = loader.get_env_config("registry") {
            match normalize_registry(&registry) {
                Ok(registry) => {
                    self.registry = registry;
                    self.sources.insert(
                        "registry".to_string(),
                        ConfigSource::Environment("PKGREPO_REGISTRY".to_string()),
                    );
                }
                Err(e) => log::warn!("Ignoring PKGREPO_REGISTRY: {}", e),
            }
        }

        if let Some(proxy) = loader.get_env_config("proxy") {
            self.proxy = Some(proxy);
            self.sources.insert(
                "proxy".to_string(),
                ConfigSource::Environment("PKGREPO_PROXY".to_string()),
            );
        }

        if let Some(true) = loader.get_env_bool("no-cache") {
            self.use_cache = false;
            self.sources.insert(
                "use-cache".to_string(),
                ConfigSource::Environment("PKGREPO_NO_CACHE".to_string()),
            );
        }

        if let Some(ttl) = loader.get_env_u64("version-index-ttl") {
            self.version_index_ttl = ttl;
            self.sources.insert(
                "version-index-ttl".to_string(),
                ConfigSource::Environment("PKGREPO_VERSION_INDEX_TTL".to_string()),
            );
        }
    }

    /// Where the current value of `key` came from
    pub fn source_of(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    pub fn version_index_ttl(&self) -> Duration {
        Duration::from_secs(self.version_index_ttl)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }
}

/// Registry URLs must parse; the trailing slash is dropped
fn normalize_registry(registry: &str) -> Result<String> {
    let trimmed = registry.trim().trim_end_matches('/');
    url::Url::parse(trimmed)
        .map_err(|e| RepositoryError::Config(format!("Invalid registry URL \"{}\": {}", registry, e)))?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepoConfig::default();
        assert!(config.use_cache);
        assert!(config.component);
        assert_eq!(config.registry, DEFAULT_REGISTRY);
        assert_eq!(config.version_index_ttl(), Duration::from_secs(300));
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_normalize_registry() {
        assert_eq!(
            normalize_registry("https://registry.example.com/").unwrap(),
            "https://registry.example.com"
        );
        assert!(matches!(normalize_registry("not a url"), Err(RepositoryError::Config(_))));
    }

    #[test]
    fn test_build_without_project() {
        let config = RepoConfig::build(None::<&Path>, false).unwrap();
        assert_eq!(config.source_of("registry"), Some(&ConfigSource::Default));
    }
}
