#![allow(dead_code)]

use async_trait::async_trait;
use image_share_backend::AppState;
use image_share_backend::config::AppConfig;
use image_share_backend::models::TempFile;
use image_share_backend::services::cropper::ImageCropper;
use image_share_backend::services::short_url::{
    AssociationStore, ShortUrlResolver, ShorteningService,
};
use image_share_backend::services::storage::{StorageError, StorageService};
use image_share_backend::services::temp_store::{LocalTempStore, TempStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

pub const DOMAIN: &str = "http://domain";

pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

pub struct MockStorageService {
    pub files: Mutex<HashMap<String, StoredObject>>,
    delay: Duration,
    fail_status: Option<u16>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            fail_status: None,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn get(&self, file_name: &str) -> Option<(Vec<u8>, String)> {
        self.files
            .lock()
            .unwrap()
            .get(file_name)
            .map(|o| (o.data.clone(), o.content_type.clone()))
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn put_file(
        &self,
        local_path: &Path,
        file_name: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let data = tokio::fs::read(local_path).await?;
        tokio::time::sleep(self.delay).await;

        if let Some(status) = self.fail_status {
            return Err(StorageError::Rejected { status });
        }

        self.files.lock().unwrap().insert(
            file_name.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, file_name: &str) -> String {
        format!("http://bucket.test/images/{}", file_name)
    }
}

/// Local temp store that records every removal per path
pub struct CountingTempStore {
    inner: LocalTempStore,
    removals: Mutex<HashMap<PathBuf, usize>>,
}

impl CountingTempStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            inner: LocalTempStore::new(dir).unwrap(),
            removals: Mutex::new(HashMap::new()),
        }
    }

    pub fn removals_of(&self, path: &Path) -> usize {
        self.removals
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_removals(&self) -> usize {
        self.removals.lock().unwrap().values().sum()
    }

    pub fn max_removals_per_file(&self) -> usize {
        self.removals
            .lock()
            .unwrap()
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TempStore for CountingTempStore {
    fn create_incoming(&self) -> std::io::Result<NamedTempFile> {
        self.inner.create_incoming()
    }

    fn allocate(&self, file_name: &str) -> PathBuf {
        self.inner.allocate(file_name)
    }

    async fn remove(&self, path: &Path) {
        *self
            .removals
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default() += 1;
        self.inner.remove(path).await;
    }
}

/// Shortener answering with a fixed URL after a delay
pub struct DelayedShortener {
    url: String,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl DelayedShortener {
    pub fn new(url: &str, delay: Duration) -> Self {
        Self {
            url: url.to_string(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ShorteningService for DelayedShortener {
    async fn shorten(&self, _long_url: &str) -> anyhow::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Some(self.url.clone()))
    }
}

pub struct FailingShortener;

#[async_trait]
impl ShorteningService for FailingShortener {
    async fn shorten(&self, _long_url: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow::anyhow!("shortener unreachable"))
    }
}

#[derive(Default)]
pub struct MemoryAssociationStore {
    pub records: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl AssociationStore for MemoryAssociationStore {
    async fn put(&self, file_name: &str, short_url: &str) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(file_name.to_string(), short_url.to_string());
        Ok(())
    }

    async fn find_by_file_name(&self, file_name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.records.lock().unwrap().get(file_name).cloned())
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub temp_store: Arc<CountingTempStore>,
    pub storage: Arc<MockStorageService>,
    pub state: AppState,
}

impl TestApp {
    pub fn new(storage: MockStorageService, resolver: ShortUrlResolver) -> Self {
        Self::build(Some(storage), resolver, |_| {})
    }

    pub fn build(
        storage: Option<MockStorageService>,
        resolver: ShortUrlResolver,
        tweak: impl FnOnce(&mut AppConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            domain: DOMAIN.to_string(),
            temp_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        tweak(&mut config);

        let temp_store = Arc::new(CountingTempStore::new(dir.path()));
        let configured = storage.is_some();
        let storage = Arc::new(storage.unwrap_or_else(MockStorageService::new));
        let storage_service: Option<Arc<dyn StorageService>> = if configured {
            Some(storage.clone())
        } else {
            None
        };

        let state = AppState::new(
            config,
            temp_store.clone(),
            storage_service,
            Arc::new(ImageCropper),
            resolver,
        );

        Self {
            dir,
            temp_store,
            storage,
            state,
        }
    }

    /// Writes `data` into the temp dir as if it had just been received
    pub fn temp_file(&self, name: &str, data: &[u8], content_type: &str) -> TempFile {
        let path = self.dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        TempFile {
            path,
            size: data.len() as u64,
            content_type: content_type.to_string(),
        }
    }

    pub fn files_left(&self) -> usize {
        std::fs::read_dir(self.dir.path()).unwrap().count()
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 10, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 10, 200]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Jpeg(90))
        .unwrap();
    out.into_inner()
}

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// Builds a multipart/form-data body with text fields and an optional file part
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&[u8], &str)>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((data, content_type)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"image\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Polls until `check` passes or a second has gone by
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
