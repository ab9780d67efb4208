use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::{verify_file, FetchOptions, FetchedFile, Headers, Transport};
use crate::config::RepoConfig;
use crate::http::{HttpClient, HttpClientConfig};
use crate::util::sha1_hex;
use crate::{RepositoryError, Result};

/// Transport over [`HttpClient`].
///
/// Downloads land in `<target>/<sha1(url)><ext>`. The body is streamed into a
/// temporary file in the same directory and renamed into place only after the
/// checksum has been verified, so a partially written file is never visible
/// under its final name.
pub struct HttpTransport {
    client: Arc<HttpClient>,
}

impl HttpTransport {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &RepoConfig) -> Result<Self> {
        let client = HttpClient::with_config(HttpClientConfig::from_repo_config(config))
            .map_err(|e| RepositoryError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Whether an existing file can be used as is
    async fn reusable(&self, file: &Path, shasum: Option<&str>) -> Result<bool> {
        if !tokio::fs::try_exists(file).await? {
            return Ok(false);
        }
        match shasum {
            Some(expected) => verify_file(file, expected).await,
            None => Ok(true),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, options: FetchOptions) -> Result<FetchedFile> {
        let file = options
            .target
            .join(format!("{}{}", sha1_hex(url), options.ext_name));
        let shasum = options.shasum.as_deref();

        if options.use_cache && self.reusable(&file, shasum).await? {
            log::debug!("Reusing {} for {}", file.display(), url);
            return Ok(FetchedFile {
                file,
                from_cache: true,
            });
        }

        tokio::fs::create_dir_all(&options.target).await?;
        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&options.target)?
            .into_temp_path();

        log::debug!("Downloading {} to {}", url, file.display());
        let bytes = self
            .client
            .download(url, &temp, &options.headers, options.progress.as_deref())
            .await?;

        if let Some(expected) = shasum {
            if !verify_file(&temp, expected).await? {
                return Err(RepositoryError::ChecksumMismatch {
                    url: url.to_string(),
                });
            }
        }

        temp.persist(&file).map_err(|e| RepositoryError::Io(e.error))?;
        log::debug!("Downloaded {} ({} bytes)", url, bytes);

        Ok(FetchedFile {
            file,
            from_cache: false,
        })
    }

    async fn fetch_json(&self, url: &str, headers: &Headers) -> Result<serde_json::Value> {
        log::debug!("Fetching {}", url);
        Ok(self.client.get_json(url, headers).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn transport() -> HttpTransport {
        HttpTransport::new(Arc::new(HttpClient::new().unwrap()))
    }

    #[tokio::test]
    async fn test_existing_file_skips_network() {
        let dir = TempDir::new().unwrap();
        // Nothing listens here; a request would fail
        let url = "http://127.0.0.1:9/pkg-1.0.0.tgz";
        let cached = dir.path().join(format!("{}.tgz", sha1_hex(url)));
        std::fs::write(&cached, b"hello world").unwrap();

        let mut options = FetchOptions::new(dir.path());
        options.ext_name = ".tgz".to_string();
        options.shasum = Some("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed".to_string());

        let fetched = transport().fetch(url, options).await.unwrap();
        assert!(fetched.from_cache);
        assert_eq!(fetched.file, cached);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let client = HttpClient::with_config(HttpClientConfig::new().with_max_retries(0)).unwrap();
        let transport = HttpTransport::new(Arc::new(client));

        let result = transport
            .fetch("http://127.0.0.1:9/pkg.tgz", FetchOptions::new(dir.path()))
            .await;

        assert!(matches!(result, Err(RepositoryError::Download { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_json() {
        let doc = transport()
            .fetch_json("https://registry.npmjs.org/left-pad", &Headers::new())
            .await
            .unwrap();
        assert_eq!(doc["name"], "left-pad");
    }
}
