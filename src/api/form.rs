use crate::api::error::AppError;
use crate::models::TempFile;
use crate::services::temp_store::TempStore;
use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use std::collections::HashMap;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file part written to the temporary file store.
///
/// Until [`IncomingFile::keep`] is called the file is deleted on drop, which
/// covers aborted transfers and requests dropped mid-way.
#[derive(Debug)]
pub struct IncomingFile {
    path: TempPath,
    size: u64,
    content_type: String,
}

impl IncomingFile {
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hands ownership of the file on disk to the caller.
    pub fn keep(self) -> Result<TempFile, AppError> {
        let path = self
            .path
            .keep()
            .map_err(|e| AppError::Internal(format!("Failed to keep upload: {}", e)))?;
        Ok(TempFile {
            path,
            size: self.size,
            content_type: self.content_type,
        })
    }
}

/// Text fields plus the optional `file` part of a multipart form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<IncomingFile>,
}

impl UploadForm {
    /// Non-empty text field value
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub async fn read(
        multipart: &mut Multipart,
        temp_store: &dyn TempStore,
    ) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                if form.file.is_some() {
                    tracing::debug!("Ignoring extra file part");
                    continue;
                }
                form.file = Some(receive_file(field, temp_store).await?);
            } else {
                let text = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }
}

async fn receive_file(
    mut field: Field<'_>,
    temp_store: &dyn TempStore,
) -> Result<IncomingFile, AppError> {
    let declared_type = field
        .content_type()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty());

    let incoming = temp_store
        .create_incoming()
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?;
    let (std_file, path) = incoming.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut size: u64 = 0;
    let mut sniffed_type = None;

    // `path` is still a TempPath here: any early return removes the partial file
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if size == 0 && declared_type.is_none() {
            sniffed_type = infer::get(&chunk).map(|t| t.mime_type().to_string());
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        size += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let content_type = declared_type
        .or(sniffed_type)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    tracing::debug!(
        "Received {} ({} bytes, {})",
        path.display(),
        size,
        content_type
    );

    Ok(IncomingFile {
        path,
        size,
        content_type,
    })
}

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}
