//! Configuration for the acquisition core
//!
//! Values are layered, highest priority first:
//!
//! 1. Environment variables (`PKGREPO_*`)
//! 2. Project `pkgrepo.json`
//! 3. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use pkgrepo::config::RepoConfig;
//! use std::path::Path;
//!
//! let config = RepoConfig::build(Some(Path::new("/path/to/project")), true).unwrap();
//! println!("Cache dir: {}", config.cache_dir.display());
//! println!("Registry: {}", config.registry);
//! ```

mod config;
mod source;

pub use config::{RepoConfig, DEFAULT_REGISTRY, DEFAULT_VERSION_INDEX_TTL};
pub use source::{ConfigLoader, ConfigSource, RawConfig, CONFIG_FILE_NAME};
