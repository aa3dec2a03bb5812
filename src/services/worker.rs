use crate::services::session_registry::SessionRegistry;
use crate::services::temp_store::TempStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically evicts idle client sessions and deletes their staged files.
pub struct BackgroundWorker {
    registry: SessionRegistry,
    temp_store: Arc<dyn TempStore>,
    session_ttl: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        registry: SessionRegistry,
        temp_store: Arc<dyn TempStore>,
        session_ttl: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            temp_store,
            session_ttl,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Session sweeper started (ttl: {:?}, interval: {:?})",
            self.session_ttl,
            self.interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Session sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Returns the number of staged files deleted.
    pub async fn sweep(&self) -> usize {
        let before = self.registry.len();
        let released = self.registry.evict_idle(self.session_ttl);
        let evicted = before.saturating_sub(self.registry.len());

        for file in &released {
            self.temp_store.remove(&file.path).await;
        }

        if evicted > 0 {
            tracing::info!(
                "🧹 Evicted {} idle sessions, deleted {} staged files",
                evicted,
                released.len()
            );
        }
        released.len()
    }
}
