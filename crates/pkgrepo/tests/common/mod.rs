//! Fakes and fixtures shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use pkgrepo::cache::FsCacheGateway;
use pkgrepo::transport::{FetchOptions, FetchedFile, Headers, Transport};
use pkgrepo::unpack::{ArchiveUnpacker, Unpacker};
use pkgrepo::util::sha1_hex;
use pkgrepo::{RepoConfig, RepositoryContext, RepositoryError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REGISTRY: &str = "https://registry.example.com";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Gzipped tarball with every entry under `package/`, like registry tarballs
pub fn tgz(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, format!("package/{}", name), body.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// What the fake serves for file fetches
#[derive(Clone)]
pub enum Payload {
    Bytes(Vec<u8>),
    Fail(String),
}

/// Transport serving canned bytes and documents, counting what it is asked
pub struct FakeTransport {
    payload: Mutex<Payload>,
    documents: Mutex<HashMap<String, serde_json::Value>>,
    delay: Duration,
    /// Every `fetch` call, cached or not
    pub fetch_calls: Mutex<Vec<String>>,
    /// Fetches that had to "hit the network"
    pub downloads: AtomicUsize,
    pub json_calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeTransport {
    pub fn serving(payload: Payload) -> Self {
        Self {
            payload: Mutex::new(payload),
            documents: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            fetch_calls: Mutex::new(Vec::new()),
            downloads: AtomicUsize::new(0),
            json_calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn archive(entries: &[(&str, &str)]) -> Self {
        Self::serving(Payload::Bytes(tgz(entries)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_document(self, url: &str, doc: serde_json::Value) -> Self {
        self.documents.lock().unwrap().insert(url.to_string(), doc);
        self
    }

    pub fn set_payload(&self, payload: Payload) {
        *self.payload.lock().unwrap() = payload;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.lock().unwrap().len()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, url: &str, options: FetchOptions) -> Result<FetchedFile> {
        self.fetch_calls.lock().unwrap().push(url.to_string());

        let file = options
            .target
            .join(format!("{}{}", sha1_hex(url), options.ext_name));
        if options.use_cache && file.exists() {
            return Ok(FetchedFile {
                file,
                from_cache: true,
            });
        }

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let payload = self.payload.lock().unwrap().clone();
        match payload {
            Payload::Bytes(bytes) => {
                std::fs::create_dir_all(&options.target)?;
                std::fs::write(&file, bytes)?;
                if let Some(progress) = &options.progress {
                    progress(1, 1);
                }
                Ok(FetchedFile {
                    file,
                    from_cache: false,
                })
            }
            Payload::Fail(reason) => Err(RepositoryError::download(url, reason)),
        }
    }

    async fn fetch_json(&self, url: &str, _headers: &Headers) -> Result<serde_json::Value> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RepositoryError::download(url, "HTTP 404"))
    }
}

/// Archive unpacker that remembers what it expanded
#[derive(Default)]
pub struct RecordingUnpacker {
    inner: ArchiveUnpacker,
    pub expanded: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl RecordingUnpacker {
    pub fn count(&self) -> usize {
        self.expanded.lock().unwrap().len()
    }
}

#[async_trait]
impl Unpacker for RecordingUnpacker {
    async fn expand(&self, source: &Path, target: &Path) -> Result<PathBuf> {
        self.expanded
            .lock()
            .unwrap()
            .push((source.to_path_buf(), target.to_path_buf()));
        self.inner.expand(source, target).await
    }
}

pub struct Harness {
    pub context: Arc<RepositoryContext>,
    pub transport: Arc<FakeTransport>,
    pub unpacker: Arc<RecordingUnpacker>,
    pub root: PathBuf,
}

impl Harness {
    pub fn new(root: &Path, transport: FakeTransport) -> Self {
        init_logging();

        let mut config = RepoConfig::with_cache_dir(root);
        config.registry = REGISTRY.to_string();

        let transport = Arc::new(transport);
        let unpacker = Arc::new(RecordingUnpacker::default());
        let context = Arc::new(RepositoryContext::new(
            config,
            Arc::new(FsCacheGateway::new(root)),
            transport.clone(),
            unpacker.clone(),
        ));

        Self {
            context,
            transport,
            unpacker,
            root: root.to_path_buf(),
        }
    }

    /// Download records currently stored
    pub fn index_records(&self) -> Vec<serde_json::Value> {
        let dir = self.root.join(".index");
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .map(|e| serde_json::from_slice(&std::fs::read(e.path()).unwrap()).unwrap())
            .collect()
    }
}
