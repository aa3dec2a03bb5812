pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers;
use crate::config::AppConfig;
use crate::services::cropper::Cropper;
use crate::services::session_registry::SessionRegistry;
use crate::services::short_url::ShortUrlResolver;
use crate::services::staging_service::StagingService;
use crate::services::storage::StorageService;
use crate::services::temp_store::TempStore;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and text fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::staging::pre_upload,
        handlers::staging::clear_file,
        handlers::upload::upload,
        handlers::short_url::short_url,
        handlers::image::show_image,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::AckResponse,
            models::UrlResponse,
            models::CropRegion,
            handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "upload", description = "Staging and uploading images"),
        (name = "images", description = "Serving uploaded images"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: SessionRegistry,
    pub temp_store: Arc<dyn TempStore>,
    pub staging: Arc<StagingService>,
    pub uploads: Arc<UploadService>,
    pub resolver: ShortUrlResolver,
    pub storage: Option<Arc<dyn StorageService>>,
}

impl AppState {
    /// Wires the services around one shared session registry.
    pub fn new(
        config: AppConfig,
        temp_store: Arc<dyn TempStore>,
        storage: Option<Arc<dyn StorageService>>,
        cropper: Arc<dyn Cropper>,
        resolver: ShortUrlResolver,
    ) -> Self {
        let registry = SessionRegistry::new();
        let staging = Arc::new(StagingService::new(registry.clone(), temp_store.clone()));
        let uploads = Arc::new(UploadService::new(
            config.clone(),
            registry.clone(),
            temp_store.clone(),
            storage.clone(),
            cropper,
            resolver.clone(),
        ));

        Self {
            config,
            registry,
            temp_store,
            staging,
            uploads,
            resolver,
            storage,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health::health_check))
        .route("/preupload", post(handlers::staging::pre_upload))
        .route("/clearfile", post(handlers::staging::clear_file))
        .route("/upload", post(handlers::upload::upload))
        .route("/shorturl/:file_name", get(handlers::short_url::short_url))
        .route("/:file_name", get(handlers::image::show_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(api::middleware::request_id::request_span)
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // Outermost, so the trace span already sees the request id
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
