use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Local directory where received and cropped files live until they reach storage.
#[async_trait]
pub trait TempStore: Send + Sync {
    /// Creates an empty incoming file. It is deleted when dropped unless kept.
    fn create_incoming(&self) -> io::Result<NamedTempFile>;

    /// Path for a derived file (e.g. a crop result) named `file_name`.
    fn allocate(&self, file_name: &str) -> PathBuf;

    /// Deletes a file. Failures are logged, never returned.
    async fn remove(&self, path: &Path);
}

pub struct LocalTempStore {
    dir: PathBuf,
}

impl LocalTempStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl TempStore for LocalTempStore {
    fn create_incoming(&self) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.dir)
    }

    fn allocate(&self, file_name: &str) -> PathBuf {
        self.dir.join(format!("crop-{}", file_name))
    }

    async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed temp file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Temp file {} already gone", path.display())
            }
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove temp file"
            ),
        }
    }
}
