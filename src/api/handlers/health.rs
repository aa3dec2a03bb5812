use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub shortener: String,
    pub short_url_store: String,
    pub sessions: usize,
    pub version: String,
}

fn configured(yes: bool) -> String {
    let status = if yes { "configured" } else { "not configured" };
    status.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        storage: configured(state.storage.is_some()),
        shortener: configured(state.resolver.can_shorten()),
        short_url_store: configured(state.resolver.can_lookup()),
        sessions: state.registry.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
