use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::util::sha1_hex;
use crate::Result;

fn sanitize_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new("[^A-Za-z0-9._@-]").unwrap())
}

const MAX_STEM: usize = 96;

/// Directory of JSON documents addressed by arbitrary string keys
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Readable file name for `key`; the hash suffix keeps distinct keys
    /// apart after sanitizing.
    fn sanitize_key(key: &str) -> String {
        let readable = sanitize_regex().replace_all(key, "-");
        let stem: String = readable.chars().take(MAX_STEM).collect();
        format!("{}-{}.json", stem, &sha1_hex(key)[..8])
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::sanitize_key(key))
    }

    /// Read the document under `key`. Unreadable documents count as absent.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("Ignoring corrupt cache record {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Write the document under `key`, replacing any previous one atomically
    pub async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let dir = self.dir.clone();
        let body = serde_json::to_vec_pretty(value)?;

        // Each writer gets its own temp file; the last rename wins
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut temp = tempfile::Builder::new()
                .prefix(".write-")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            temp.write_all(&body)?;
            temp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every readable document in the store
    pub async fn list<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut values = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(value) => values.push(value),
                    Err(e) => log::warn!("Ignoring corrupt cache record {}: {}", path.display(), e),
                },
                // Removed concurrently
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(values)
    }
}
