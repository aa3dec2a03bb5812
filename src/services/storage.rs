use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage rejected the upload with status {status}")]
    Rejected { status: u16 },

    #[error("storage request failed: {0}")]
    Transport(String),

    #[error("failed to read local file: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// HTTP status reported by the storage backend, when it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::Rejected { status } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Uploads the local file as `file_name` with the given content type.
    async fn put_file(
        &self,
        local_path: &Path,
        file_name: &str,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Public URL the stored object is served from.
    fn public_url(&self, file_name: &str) -> String;
}

pub struct S3StorageService {
    client: Client,
    config: StorageConfig,
}

impl S3StorageService {
    pub fn new(client: Client, config: StorageConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn put_file(
        &self,
        local_path: &Path,
        file_name: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let key = self.config.object_key(file_name);
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let res = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(content_type)
            .body(body)
            .send()
            .await;

        match res {
            Ok(_) => {
                tracing::info!("Stored {}/{}", self.config.bucket, key);
                Ok(())
            }
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                tracing::error!(
                    "S3 put_object failed: {}/{}, status={:?}, error={:?}",
                    self.config.bucket,
                    key,
                    status,
                    e
                );
                Err(match status {
                    Some(status) => StorageError::Rejected { status },
                    None => StorageError::Transport(e.to_string()),
                })
            }
        }
    }

    fn public_url(&self, file_name: &str) -> String {
        self.config.public_object_url(file_name)
    }
}
