use crate::config::AppConfig;
use crate::services::short_url::{
    AssociationStore, BitlyShortener, ParseAssociationStore, ShortUrlResolver, ShorteningService,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Builds the resolver from whichever credentials are configured.
pub fn setup_short_url_resolver(config: &AppConfig) -> Result<ShortUrlResolver> {
    let shortener: Option<Arc<dyn ShorteningService>> = match &config.shortener {
        Some(c) => {
            info!("🔗 URL shortener: {}", c.endpoint);
            Some(Arc::new(BitlyShortener::new(c)?))
        }
        None => {
            info!("🔗 URL shortener not configured, canonical URLs only");
            None
        }
    };

    let store: Option<Arc<dyn AssociationStore>> = match &config.association_store {
        Some(c) => {
            info!("🗂️  Short URL store: {}", c.endpoint);
            Some(Arc::new(ParseAssociationStore::new(c)?))
        }
        None => {
            info!("🗂️  Short URL store not configured, lookups disabled");
            None
        }
    };

    Ok(ShortUrlResolver::new(shortener, store))
}
