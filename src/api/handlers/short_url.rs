use crate::AppState;
use crate::api::error::AppError;
use crate::models::UrlResponse;
use crate::services::short_url::ShortenOutcome;
use axum::{
    Json,
    extract::{Path, State},
};

#[utoipa::path(
    get,
    path = "/shorturl/{file_name}",
    params(
        ("file_name" = String, Path, description = "Generated image file name")
    ),
    responses(
        (status = 200, description = "Previously issued short URL", body = UrlResponse),
        (status = 404, description = "No short URL recorded"),
        (status = 503, description = "Short URL store not configured")
    ),
    tag = "images"
)]
pub async fn short_url(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<UrlResponse>, AppError> {
    if !state.resolver.can_lookup() {
        return Err(AppError::NotConfigured("short URL store".to_string()));
    }

    match state.resolver.lookup(&file_name).await {
        ShortenOutcome::Resolved(url) => Ok(Json(UrlResponse { url })),
        _ => Err(AppError::NotFound("Not found".to_string())),
    }
}
