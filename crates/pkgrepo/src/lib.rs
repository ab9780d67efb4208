//! Package acquisition core.
//!
//! Given a package reference, a [`Repository`] resolves a concrete version,
//! materializes the package files on disk and records the download so later
//! installs can skip the network and the decompression.
//!
//! ```no_run
//! use pkgrepo::{create_repository, DownloadOptions, PackageReference, RepoConfig, RepositoryContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> pkgrepo::Result<()> {
//! let config = RepoConfig::build(None::<&std::path::Path>, true)?;
//! let context = Arc::new(RepositoryContext::from_config(config)?);
//!
//! let mut repo = create_repository(PackageReference::parse("left-pad@^1.3.0")?, context)?;
//! let result = repo.acquire(DownloadOptions::new()).await?;
//! println!("{} ready in {}", result.name, result.dir.display());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod repository;
pub mod transport;
pub mod unpack;
pub mod util;

pub use cache::{CacheEntry, CacheGateway, FsCacheGateway, RepositoryIdentity};
pub use config::RepoConfig;
pub use error::{RepositoryError, Result};
pub use repository::{
    create_repository, ArchiveRepository, DownloadOptions, DownloadResult, LocalRepository, OriginType,
    PackageReference, RegistryRepository, Repository, RepositoryContext, RepositoryOptions, VersionRecord,
};
pub use transport::{HttpTransport, Transport};
pub use unpack::{ArchiveUnpacker, Unpacker};
