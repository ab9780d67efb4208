//! HTTP client used by the shipped transport.
//!
//! A thin wrapper around `reqwest` with:
//! - Automatic retry with exponential backoff on 5xx and 429
//! - Per-request headers on top of the client defaults
//! - Streaming downloads with a progress callback
//! - Proxy and custom CA certificate support
//!
//! # Examples
//!
//! ```no_run
//! use indexmap::IndexMap;
//! use pkgrepo::http::{HttpClient, HttpClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig::new()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_max_retries(5);
//! let client = HttpClient::with_config(config)?;
//!
//! let headers = IndexMap::new();
//! let doc: serde_json::Value = client
//!     .get_json("https://registry.npmjs.org/left-pad", &headers)
//!     .await?;
//! println!("{}", doc["name"]);
//! # Ok(())
//! # }
//! ```

use indexmap::IndexMap;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::RepoConfig;

const DEFAULT_USER_AGENT: &str = concat!("pkgrepo/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Max retries exceeded for {url}")]
    MaxRetries { url: String },

    #[error("JSON deserialization error: {0}")]
    JsonParse(String),
}

impl HttpError {
    /// The URL the failure relates to, when known
    pub fn url(&self) -> Option<String> {
        match self {
            HttpError::Request(e) => e.url().map(|u| u.to_string()),
            HttpError::HttpStatus { url, .. } | HttpError::MaxRetries { url } => Some(url.clone()),
            _ => None,
        }
    }
}

pub struct HttpClient {
    client: Client,
    user_agent: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)?;
            builder = builder.proxy(proxy);
        }

        if let Some(cafile) = &config.cafile {
            match std::fs::read(cafile).map(|bytes| reqwest::Certificate::from_pem(&bytes)) {
                Ok(Ok(cert)) => builder = builder.add_root_certificate(cert),
                Ok(Err(e)) => log::warn!("Ignoring CA file {}: {}", cafile.display(), e),
                Err(e) => log::warn!("Ignoring CA file {}: {}", cafile.display(), e),
            }
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Perform GET request with automatic retries
    pub async fn get(&self, url: &str, headers: &IndexMap<String, String>) -> Result<Response, HttpError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.execute_get(url, headers).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(HttpError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    } else {
                        // 4xx other than 429 will not get better
                        return Err(HttpError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                }
                Err(e @ HttpError::InvalidHeader { .. }) => return Err(e),
                Err(e) => {
                    last_error = Some(e);
                }
            }

            if attempt < self.max_retries {
                // 1s, 2s, 4s, ...
                let delay = self.retry_delay * 2_u32.pow(attempt);
                log::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Err(HttpError::MaxRetries {
                url: url.to_string(),
            }),
        }
    }

    async fn execute_get(&self, url: &str, headers: &IndexMap<String, String>) -> Result<Response, HttpError> {
        let mut request = self.client.get(url).header("Accept-Encoding", "gzip");

        for (name, value) in headers {
            let name_value = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                HttpError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            request = request.header(name_value, header_value);
        }

        let response = request.send().await?;
        Ok(response)
    }

    /// GET JSON and deserialize
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &IndexMap<String, String>,
    ) -> Result<T, HttpError> {
        let response = self.get(url, headers).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| HttpError::JsonParse(e.to_string()))
    }

    /// Stream `url` into `dest`, reporting `(downloaded, total)` after each chunk.
    ///
    /// `total` is 0 when the server sends no Content-Length.
    pub async fn download<F>(
        &self,
        url: &str,
        dest: &Path,
        headers: &IndexMap<String, String>,
        progress: Option<F>,
    ) -> Result<u64, HttpError>
    where
        F: Fn(u64, u64),
    {
        let response = self.get(url, headers).await?;
        let total_size = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut downloaded: u64 = 0;

        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(ref callback) = progress {
                callback(downloaded, total_size);
            }
        }

        file.flush().await?;

        Ok(downloaded)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub proxy: Option<String>,
    pub cafile: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            proxy: None,
            cafile: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport settings taken from the repository configuration
    pub fn from_repo_config(config: &RepoConfig) -> Self {
        let mut http = Self::default()
            .with_timeout(config.http_timeout())
            .with_max_retries(config.http_retries);
        if let Some(proxy) = &config.proxy {
            http = http.with_proxy(proxy.clone());
        }
        if let Some(cafile) = &config.cafile {
            http = http.with_cafile(cafile.clone());
        }
        http
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_cafile(mut self, cafile: PathBuf) -> Self {
        self.cafile = Some(cafile);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HttpClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(5)
            .with_user_agent("Test/1.0".to_string());

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.user_agent, "Test/1.0");
    }

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();

        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
        assert!(config.user_agent.starts_with("pkgrepo/"));
        assert!(config.proxy.is_none());
        assert!(config.cafile.is_none());
    }

    #[test]
    fn test_from_repo_config() {
        let mut repo = RepoConfig::default();
        repo.http_timeout = 5;
        repo.http_retries = 0;

        let config = HttpClientConfig::from_repo_config(&repo);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_from_repo_config_proxy_and_cafile() {
        let mut repo = RepoConfig::default();
        assert!(HttpClientConfig::from_repo_config(&repo).proxy.is_none());

        repo.proxy = Some("http://proxy.internal:3128".to_string());
        repo.cafile = Some(PathBuf::from("/etc/ssl/corp.pem"));

        let config = HttpClientConfig::from_repo_config(&repo);
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.internal:3128"));
        assert_eq!(config.cafile, Some(PathBuf::from("/etc/ssl/corp.pem")));
        assert!(HttpClient::with_config(config).is_ok());
    }

    #[test]
    fn test_error_url() {
        let err = HttpError::HttpStatus {
            status: 404,
            url: "https://example.com/a.tgz".to_string(),
        };
        assert_eq!(err.url().as_deref(), Some("https://example.com/a.tgz"));
        assert_eq!(HttpError::JsonParse("x".into()).url(), None);
    }

    #[tokio::test]
    async fn test_client_with_config() {
        let config = HttpClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(5);

        let client = HttpClient::with_config(config).unwrap();
        assert_eq!(client.max_retries(), 5);
        assert!(client.user_agent().starts_with("pkgrepo/"));
    }

    #[tokio::test]
    async fn test_invalid_header_is_not_retried() {
        let config = HttpClientConfig::new().with_max_retries(3);
        let client = HttpClient::with_config(config).unwrap();

        let mut headers = IndexMap::new();
        headers.insert("bad header".to_string(), "v".to_string());

        let result = client.get("http://127.0.0.1:9/", &headers).await;
        assert!(matches!(result, Err(HttpError::InvalidHeader { .. })));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_json() {
        let client = HttpClient::new().unwrap();
        let doc: serde_json::Value = client
            .get_json("https://httpbin.org/get", &IndexMap::new())
            .await
            .unwrap();
        assert_eq!(doc["url"], "https://httpbin.org/get");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_download_file_with_progress() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;
        use tempfile::TempDir;

        let client = HttpClient::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("test_file.bin");

        let downloaded = Arc::new(AtomicU64::new(0));
        let downloaded_clone = Arc::clone(&downloaded);

        let written = client
            .download(
                "https://httpbin.org/bytes/1000",
                &dest,
                &IndexMap::new(),
                Some(move |bytes, _total| {
                    downloaded_clone.store(bytes, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        assert_eq!(written, 1000);
        assert_eq!(downloaded.load(Ordering::SeqCst), 1000);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_error_404() {
        let client = HttpClient::new().unwrap();
        let response = client.get("https://httpbin.org/status/404", &IndexMap::new()).await;

        match response {
            Err(HttpError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {:?}", other.map(|r| r.status())),
        }
    }
}
