use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::models::{CropRegion, TempFile};
use crate::services::cropper::Cropper;
use crate::services::session_registry::{SessionRegistry, StagedClaim, StagedUploadGuard};
use crate::services::short_url::{ShortUrlResolver, ShortenOutcome};
use crate::services::storage::StorageService;
use crate::services::temp_store::TempStore;
use crate::utils::naming::generate_file_name;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// One upload call: an inline file, or the client's staged file when none was posted.
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub client_id: Option<String>,
    pub file: Option<TempFile>,
    pub crop: Option<CropRegion>,
}

pub struct UploadService {
    config: AppConfig,
    registry: SessionRegistry,
    temp_store: Arc<dyn TempStore>,
    storage: Option<Arc<dyn StorageService>>,
    cropper: Arc<dyn Cropper>,
    resolver: ShortUrlResolver,
}

impl UploadService {
    pub fn new(
        config: AppConfig,
        registry: SessionRegistry,
        temp_store: Arc<dyn TempStore>,
        storage: Option<Arc<dyn StorageService>>,
        cropper: Arc<dyn Cropper>,
        resolver: ShortUrlResolver,
    ) -> Self {
        Self {
            config,
            registry,
            temp_store,
            storage,
            cropper,
            resolver,
        }
    }

    pub fn storage_configured(&self) -> bool {
        self.storage.is_some()
    }

    /// Uploads the request's image and returns the URL to hand back to the client.
    ///
    /// The work runs on its own task: if the caller goes away mid-upload the
    /// storage call still finishes and the temp files are still removed.
    pub async fn upload(self: &Arc<Self>, request: UploadRequest) -> Result<String, AppError> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.process(request).await })
            .await
            .map_err(|e| AppError::Internal(format!("Upload task failed: {}", e)))?
    }

    async fn process(&self, request: UploadRequest) -> Result<String, AppError> {
        let UploadRequest {
            client_id,
            file,
            crop,
        } = request;

        let Some(storage) = self.storage.clone() else {
            if let Some(file) = &file {
                self.temp_store.remove(&file.path).await;
            }
            return Err(AppError::NotConfigured("storage".to_string()));
        };

        // 1. Resolve the source. The guard keeps a staged file marked in flight
        // until this function returns.
        let (source, _guard) = match (file, client_id.as_deref()) {
            (Some(file), _) => (file, None),
            (None, Some(client_id)) => match self.registry.claim_staged_file(client_id) {
                StagedClaim::Claimed(file) => {
                    let guard = StagedUploadGuard::new(
                        self.registry.clone(),
                        client_id.to_string(),
                        file.path.clone(),
                    );
                    (file, Some(guard))
                }
                StagedClaim::InFlight => {
                    tracing::warn!("Staged file for client {} is already uploading", client_id);
                    return Err(AppError::Conflict(
                        "Staged file is already being uploaded".to_string(),
                    ));
                }
                StagedClaim::Empty => return Err(AppError::MissingFile),
            },
            (None, None) => return Err(AppError::MissingFile),
        };

        // 2. Validate
        if source.size > self.config.max_file_size as u64 {
            tracing::warn!(
                "Rejecting {} ({} bytes > {})",
                source.path.display(),
                source.size,
                self.config.max_file_size
            );
            self.temp_store.remove(&source.path).await;
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {} byte limit",
                self.config.max_file_size
            )));
        }

        // 3. Identity
        let file_name = generate_file_name(&source.content_type);
        let long_url = self.config.canonical_url(&file_name);
        tracing::info!(
            "📤 Uploading {} as {} ({} bytes)",
            source.path.display(),
            file_name,
            source.size
        );

        // 4. Shorten alongside the rest of the upload
        let pending_short_url = self.resolver.spawn_shorten(&file_name, &long_url);

        // 5. Crop
        let upload_path = match crop {
            Some(region) => self.crop(&source, &file_name, region).await?,
            None => source.path.clone(),
        };

        // 6. Store, then drop the local copy whatever the outcome
        let stored = storage
            .put_file(&upload_path, &file_name, &source.content_type)
            .await;
        self.temp_store.remove(&upload_path).await;

        if let Err(e) = stored {
            tracing::error!("❌ Storing {} failed: {}", file_name, e);
            return Err(AppError::UploadFailed { status: e.status() });
        }

        // 7. Respond
        let url = match pending_short_url {
            Some(pending) => {
                let grace = Duration::from_millis(self.config.shorten_grace_ms);
                match pending.settle(grace).await {
                    ShortenOutcome::Resolved(short_url) => short_url,
                    outcome => {
                        tracing::debug!("No short URL for {} ({:?})", file_name, outcome);
                        long_url
                    }
                }
            }
            None => long_url,
        };

        tracing::info!("✅ Uploaded {} -> {}", file_name, url);
        Ok(url)
    }

    /// Crops `source` into a new temp file. The source is removed either way.
    async fn crop(
        &self,
        source: &TempFile,
        file_name: &str,
        region: CropRegion,
    ) -> Result<PathBuf, AppError> {
        let cropped = self.temp_store.allocate(file_name);
        let result = self.cropper.crop(&source.path, &cropped, region).await;
        self.temp_store.remove(&source.path).await;

        match result {
            Ok(()) => {
                tracing::debug!("Cropped {:?} into {}", region, cropped.display());
                Ok(cropped)
            }
            Err(e) => {
                tracing::warn!("Crop {:?} of {} failed: {}", region, file_name, e);
                // The cropper may have left a partial output behind
                if tokio::fs::try_exists(&cropped).await.unwrap_or(false) {
                    self.temp_store.remove(&cropped).await;
                }
                Err(AppError::CropFailed(e.to_string()))
            }
        }
    }
}
