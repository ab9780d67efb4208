//! Turning downloaded files and local directories into package trees.

mod archive;
mod mirror;

pub use archive::{ArchiveExtractor, ArchiveType};
pub use mirror::{mirror_directory, reset_directory};

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::{RepositoryError, Result};

#[async_trait]
pub trait Unpacker: Send + Sync {
    /// Expand `source` into `target` and return the directory holding the result.
    ///
    /// A directory source is copied, a file is extracted as an archive.
    async fn expand(&self, source: &Path, target: &Path) -> Result<PathBuf>;
}

/// Unpacker for zip and tar archives, running on the blocking pool
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveUnpacker;

impl ArchiveUnpacker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Unpacker for ArchiveUnpacker {
    async fn expand(&self, source: &Path, target: &Path) -> Result<PathBuf> {
        let source_path = source.to_path_buf();
        let target_path = target.to_path_buf();

        let outcome = tokio::task::spawn_blocking(move || {
            if source_path.is_dir() {
                mirror_directory(&source_path, &target_path).map(|_| ())
            } else {
                ArchiveExtractor::extract(&source_path, &target_path)
            }
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(target.to_path_buf()),
            Ok(Err(e)) => Err(RepositoryError::decompress(source, e)),
            Err(join) => Err(RepositoryError::Decompress {
                file: source.to_path_buf(),
                reason: join.to_string(),
            }),
        }
    }
}
