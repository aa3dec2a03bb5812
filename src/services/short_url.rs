//! Short URL resolution.
//!
//! Wraps the external shortening service and the association store that
//! remembers which short URL was issued for which file.

use crate::config::{AssociationStoreConfig, ShortenerConfig};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenOutcome {
    Resolved(String),
    Unavailable,
    /// Still in flight when the caller looked
    Pending,
}

#[async_trait]
pub trait ShorteningService: Send + Sync {
    /// Returns the short URL, or `None` when the service answered without one.
    async fn shorten(&self, long_url: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait AssociationStore: Send + Sync {
    async fn put(&self, file_name: &str, short_url: &str) -> Result<()>;
    async fn find_by_file_name(&self, file_name: &str) -> Result<Option<String>>;
}

/// Composes the shortening service and the association store into single outcomes.
/// Collaborator failures are absorbed here and reported as `Unavailable`.
#[derive(Clone, Default)]
pub struct ShortUrlResolver {
    shortener: Option<Arc<dyn ShorteningService>>,
    store: Option<Arc<dyn AssociationStore>>,
}

impl ShortUrlResolver {
    pub fn new(
        shortener: Option<Arc<dyn ShorteningService>>,
        store: Option<Arc<dyn AssociationStore>>,
    ) -> Self {
        Self { shortener, store }
    }

    pub fn can_shorten(&self) -> bool {
        self.shortener.is_some()
    }

    pub fn can_lookup(&self) -> bool {
        self.store.is_some()
    }

    pub async fn shorten(&self, file_name: &str, long_url: &str) -> ShortenOutcome {
        let Some(shortener) = &self.shortener else {
            return ShortenOutcome::Unavailable;
        };

        match shortener.shorten(long_url).await {
            Ok(Some(short_url)) => {
                tracing::debug!("Shortened {} to {}", long_url, short_url);
                self.persist(file_name, &short_url);
                ShortenOutcome::Resolved(short_url)
            }
            Ok(None) => {
                tracing::warn!("Shortening service returned no URL for {}", long_url);
                ShortenOutcome::Unavailable
            }
            Err(e) => {
                tracing::warn!("Shortening {} failed: {:#}", long_url, e);
                ShortenOutcome::Unavailable
            }
        }
    }

    /// Starts shortening in the background; the outcome lands in the returned cell.
    /// Returns `None` when no shortening service is configured.
    pub fn spawn_shorten(&self, file_name: &str, long_url: &str) -> Option<PendingShortUrl> {
        if !self.can_shorten() {
            return None;
        }

        let (tx, rx) = watch::channel(ShortenOutcome::Pending);
        let resolver = self.clone();
        let file_name = file_name.to_string();
        let long_url = long_url.to_string();
        tokio::spawn(async move {
            let outcome = resolver.shorten(&file_name, &long_url).await;
            // Nobody listening any more is fine
            let _ = tx.send(outcome);
        });

        Some(PendingShortUrl { rx })
    }

    pub async fn lookup(&self, file_name: &str) -> ShortenOutcome {
        let Some(store) = &self.store else {
            return ShortenOutcome::Unavailable;
        };

        match store.find_by_file_name(file_name).await {
            Ok(Some(short_url)) => ShortenOutcome::Resolved(short_url),
            Ok(None) => ShortenOutcome::Unavailable,
            Err(e) => {
                tracing::warn!("Short URL lookup for {} failed: {:#}", file_name, e);
                ShortenOutcome::Unavailable
            }
        }
    }

    // Detached: never delays or fails the upload response
    fn persist(&self, file_name: &str, short_url: &str) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let file_name = file_name.to_string();
        let short_url = short_url.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.put(&file_name, &short_url).await {
                tracing::warn!("Failed to record short URL for {}: {:#}", file_name, e);
            }
        });
    }
}

/// Single-slot cell filled by a background shortening task.
pub struct PendingShortUrl {
    rx: watch::Receiver<ShortenOutcome>,
}

impl PendingShortUrl {
    pub fn current(&self) -> ShortenOutcome {
        self.rx.borrow().clone()
    }

    /// Reads the outcome without blocking; if still pending, waits at most `grace`.
    ///
    /// With a zero grace (the default `SHORTEN_GRACE_MS`) a late short URL is
    /// never awaited: the response keeps the canonical URL and is not corrected
    /// afterwards, while the background task still records the short URL once.
    pub async fn settle(mut self, grace: Duration) -> ShortenOutcome {
        let current = self.current();
        if current != ShortenOutcome::Pending || grace.is_zero() {
            return current;
        }

        let settled =
            tokio::time::timeout(grace, self.rx.wait_for(|o| *o != ShortenOutcome::Pending)).await;
        match settled {
            Ok(Ok(outcome)) => outcome.clone(),
            // The task went away without reporting
            Ok(Err(_)) => ShortenOutcome::Unavailable,
            Err(_) => ShortenOutcome::Pending,
        }
    }
}

/// bit.ly v3 API client
pub struct BitlyShortener {
    client: Client,
    endpoint: String,
    login: String,
    api_key: String,
}

#[derive(Deserialize)]
struct BitlyResponse {
    status_code: u16,
    #[serde(default)]
    data: serde_json::Value,
}

impl BitlyShortener {
    pub fn new(config: &ShortenerConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build shortener HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            login: config.login.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ShorteningService for BitlyShortener {
    async fn shorten(&self, long_url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/v3/shorten", self.endpoint))
            .query(&[
                ("login", self.login.as_str()),
                ("apiKey", self.api_key.as_str()),
                ("longUrl", long_url),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("shortener responded with {}", response.status()));
        }

        let body: BitlyResponse = response.json().await.context("malformed shortener response")?;
        if body.status_code != 200 {
            return Ok(None);
        }
        Ok(body.data["url"].as_str().map(str::to_string))
    }
}

/// Parse REST API client for the `short_url` class
pub struct ParseAssociationStore {
    client: Client,
    endpoint: String,
    app_id: String,
    api_key: String,
}

#[derive(Serialize)]
struct ShortUrlRecord<'a> {
    #[serde(rename = "fileName")]
    file_name: &'a str,
    #[serde(rename = "shortURL")]
    short_url: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StoredShortUrl>,
}

#[derive(Deserialize)]
struct StoredShortUrl {
    #[serde(rename = "shortURL")]
    short_url: Option<String>,
}

impl ParseAssociationStore {
    pub fn new(config: &AssociationStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build association store HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn class_url(&self) -> String {
        format!("{}/1/classes/short_url", self.endpoint)
    }
}

#[async_trait]
impl AssociationStore for ParseAssociationStore {
    async fn put(&self, file_name: &str, short_url: &str) -> Result<()> {
        self.client
            .post(self.class_url())
            .header("X-Parse-Application-Id", &self.app_id)
            .header("X-Parse-REST-API-Key", &self.api_key)
            .json(&ShortUrlRecord {
                file_name,
                short_url,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn find_by_file_name(&self, file_name: &str) -> Result<Option<String>> {
        let where_clause = serde_json::json!({ "fileName": file_name }).to_string();
        let response: QueryResponse = self
            .client
            .get(self.class_url())
            .header("X-Parse-Application-Id", &self.app_id)
            .header("X-Parse-REST-API-Key", &self.api_key)
            .query(&[("where", where_clause)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed association store response")?;

        Ok(response
            .results
            .into_iter()
            .next()
            .and_then(|record| record.short_url))
    }
}
