//! Checksum verification for downloaded files.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::{RepositoryError, Result};

const READ_BUFFER: usize = 64 * 1024;

/// Supported checksum types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumType {
    /// Detect checksum type from length of hex string
    pub fn from_hex_length(len: usize) -> Option<Self> {
        match len {
            32 => Some(ChecksumType::Md5),
            40 => Some(ChecksumType::Sha1),
            64 => Some(ChecksumType::Sha256),
            96 => Some(ChecksumType::Sha384),
            128 => Some(ChecksumType::Sha512),
            _ => None,
        }
    }
}

async fn digest_file<D: Digest + Send>(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; READ_BUFFER];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect())
}

/// Verify checksum of a file
pub async fn verify_checksum(path: &Path, expected: &str, checksum_type: ChecksumType) -> Result<bool> {
    let actual = match checksum_type {
        ChecksumType::Md5 => digest_file::<Md5>(path).await?,
        ChecksumType::Sha1 => digest_file::<Sha1>(path).await?,
        ChecksumType::Sha256 => digest_file::<Sha256>(path).await?,
        ChecksumType::Sha384 => digest_file::<Sha384>(path).await?,
        ChecksumType::Sha512 => digest_file::<Sha512>(path).await?,
    };

    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

/// Verify a file against a hex digest of any supported algorithm
pub async fn verify_file(path: &Path, expected: &str) -> Result<bool> {
    let expected = expected.trim();
    let checksum_type = ChecksumType::from_hex_length(expected.len()).ok_or_else(|| {
        RepositoryError::Unsupported(format!("checksum of length {}", expected.len()))
    })?;

    verify_checksum(path, expected, checksum_type).await
}
