use clap::Parser;
use dotenvy::dotenv;
use image_share_backend::config::AppConfig;
use image_share_backend::infrastructure::{short_url, storage};
use image_share_backend::services::cropper::ImageCropper;
use image_share_backend::services::storage::StorageService;
use image_share_backend::services::temp_store::LocalTempStore;
use image_share_backend::services::worker::BackgroundWorker;
use image_share_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Image upload and sharing service")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_share_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Image Share Backend...");

    let config = AppConfig::from_env();
    info!(
        "🛡️  Config: Domain={}, Max Size={}MB, Temp Dir={}, Session TTL={}s",
        config.domain,
        config.max_file_size / 1024 / 1024,
        config.temp_dir.display(),
        config.session_ttl_secs
    );

    // Setup Infrastructure
    let temp_store = Arc::new(LocalTempStore::new(&config.temp_dir)?);
    let storage_service: Option<Arc<dyn StorageService>> = match &config.storage {
        Some(storage_config) => Some(storage::setup_storage(storage_config).await),
        None => {
            tracing::warn!("⚠️  Missing S3 credentials, uploads will be refused");
            None
        }
    };
    let resolver = short_url::setup_short_url_resolver(&config)?;

    let state = AppState::new(
        config.clone(),
        temp_store.clone(),
        storage_service,
        Arc::new(ImageCropper),
        resolver,
    );

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Start Session Sweeper
    let worker = BackgroundWorker::new(
        state.registry.clone(),
        temp_store,
        Duration::from_secs(config.session_ttl_secs),
        Duration::from_secs(config.sweep_interval_secs),
        shutdown_rx,
    );
    tokio::spawn(async move {
        worker.run().await;
    });

    let app = create_app(state);

    let addr = SocketAddr::from((args.host, args.port));
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
