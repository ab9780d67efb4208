//! Package origins and the shared download orchestration.

pub mod base;
mod archive;
mod factory;
mod local;
mod origin;
mod registry;
mod selector;
mod traits;
mod types;

pub use archive::ArchiveRepository;
pub use base::{RepositoryBase, RepositoryContext};
pub use factory::{create_repository, PackageReference};
pub use local::LocalRepository;
pub use origin::OriginType;
pub use registry::{parse_version_list, RegistryRepository};
pub use selector::{select_fetch_version, FetchVersionOutcome, NoMatchedVersion};
pub use traits::Repository;
pub use types::{
    DependencyEndpoint, DownloadOptions, DownloadResult, InstallSource, RepositoryOptions, UpdateInfo,
    VersionIndex, VersionList, VersionQuery, VersionRecord,
};
