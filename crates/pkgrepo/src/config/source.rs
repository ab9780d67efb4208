use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RepositoryError, Result};

/// Name of the per-project configuration file
pub const CONFIG_FILE_NAME: &str = "pkgrepo.json";

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    Project,
    Environment(String),
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Project => "project",
            ConfigSource::Environment(var) => var,
        }
    }
}

/// Configuration as written in `pkgrepo.json`; every key is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_index_ttl: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<IndexMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cafile: Option<String>,
}

/// Loads configuration from files and the environment
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get a PKGREPO_* environment variable; empty values count as unset
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Converts "cache-dir" to "PKGREPO_CACHE_DIR"
    pub fn get_env_config(&self, key: &str) -> Option<String> {
        let var = format!("PKGREPO_{}", key.replace('-', "_").to_uppercase());
        self.get_env(&var)
    }

    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key)
            .map(|val| !matches!(val.to_lowercase().as_str(), "false" | "0" | "no"))
    }

    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        self.get_env_config(key).and_then(|val| val.parse().ok())
    }

    /// Platform cache directory, falling back to `~/.pkgrepo/cache`
    pub fn default_cache_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "pkgrepo") {
            proj_dirs.cache_dir().to_path_buf()
        } else if let Some(base) = directories::BaseDirs::new() {
            base.home_dir().join(".pkgrepo").join("cache")
        } else {
            PathBuf::from(".pkgrepo").join("cache")
        }
    }

    /// Expand `~` and `$VARS` in a configured path
    pub fn expand_path(&self, raw: &str) -> PathBuf {
        match shellexpand::full(raw) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
        }
    }

    /// Load configuration from a JSON file. A missing file is an empty config.
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            RepositoryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            RepositoryError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load `pkgrepo.json` from a project directory
    pub fn load_project_config<P: AsRef<Path>>(&self, project_dir: P) -> Result<RawConfig> {
        self.load_config_file(project_dir.as_ref().join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_as_str() {
        assert_eq!(ConfigSource::Default.as_str(), "default");
        assert_eq!(ConfigSource::Project.as_str(), "project");
        assert_eq!(
            ConfigSource::Environment("PKGREPO_REGISTRY".to_string()).as_str(),
            "PKGREPO_REGISTRY"
        );
    }

    #[test]
    fn test_env_disabled() {
        let loader = ConfigLoader::new(false);
        assert_eq!(loader.get_env("PATH"), None);
        assert_eq!(loader.get_env_config("cache-dir"), None);
    }

    #[test]
    fn test_default_cache_dir() {
        let loader = ConfigLoader::new(false);
        let cache = loader.default_cache_dir();
        assert!(cache.is_absolute() || cache.ends_with("cache"));
    }

    #[test]
    fn test_expand_path_plain() {
        let loader = ConfigLoader::new(false);
        assert_eq!(loader.expand_path("/var/cache/pkgrepo"), PathBuf::from("/var/cache/pkgrepo"));
    }

    #[test]
    fn test_raw_config_kebab_case() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"cache-dir": "/tmp/c", "use-cache": false, "version-index-ttl": 10}"#,
        )
        .unwrap();
        assert_eq!(raw.cache_dir.as_deref(), Some("/tmp/c"));
        assert_eq!(raw.use_cache, Some(false));
        assert_eq!(raw.version_index_ttl, Some(10));
        assert!(raw.registry.is_none());
    }
}
