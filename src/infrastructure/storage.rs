use crate::config::StorageConfig;
use crate::services::storage::S3StorageService;
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &StorageConfig) -> Arc<S3StorageService> {
    info!(
        "☁️  S3 Storage: {} (Bucket: {}, prefix: {})",
        config.endpoint.as_deref().unwrap_or("aws"),
        config.bucket,
        config.key_prefix
    );

    let mut loader = aws_config::from_env()
        .region(Region::new(config.region.clone()))
        .credentials_provider(Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        ));
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Uploads are attempted regardless; a missing bucket shows up as a storage status
    match s3_client.head_bucket().bucket(&config.bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", config.bucket),
        Err(e) => tracing::warn!("⚠️  Bucket '{}' is not reachable: {}", config.bucket, e),
    }

    Arc::new(S3StorageService::new(s3_client, config.clone()))
}
