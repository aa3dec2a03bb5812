use crate::models::TempFile;
use crate::services::session_registry::SessionRegistry;
use crate::services::temp_store::TempStore;
use std::sync::Arc;

/// Pre-upload and clear operations against the session registry.
pub struct StagingService {
    registry: SessionRegistry,
    temp_store: Arc<dyn TempStore>,
}

impl StagingService {
    pub fn new(registry: SessionRegistry, temp_store: Arc<dyn TempStore>) -> Self {
        Self {
            registry,
            temp_store,
        }
    }

    /// Stages `file` for `client_id`, deleting whatever it displaces.
    pub async fn pre_upload(&self, client_id: &str, file: TempFile) {
        tracing::info!(
            "Staging {} ({} bytes, {}) for client {}",
            file.path.display(),
            file.size,
            file.content_type,
            client_id
        );

        if let Some(previous) = self.registry.set_staged_file(client_id, file) {
            tracing::debug!("Replacing staged file {}", previous.path.display());
            self.temp_store.remove(&previous.path).await;
        }
    }

    /// Drops the staged file for `client_id`. Clearing an empty session is a no-op.
    pub async fn clear_staged_file(&self, client_id: &str) {
        match self.registry.clear_staged_file(client_id) {
            Some(previous) => {
                tracing::info!(
                    "Cleared staged file {} for client {}",
                    previous.path.display(),
                    client_id
                );
                self.temp_store.remove(&previous.path).await;
            }
            None => tracing::debug!("Nothing staged to clear for client {}", client_id),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}
