use crate::AppState;
use crate::api::error::AppError;
use crate::api::form::UploadForm;
use crate::models::{CropRegion, UrlResponse};
use crate::services::upload_service::UploadRequest;
use axum::{
    Json,
    extract::{Multipart, State},
};

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Optional `id`, optional `file`, and `cropImage` with `crop[x]`, `crop[y]`, `crop[width]`, `crop[height]`"
    ),
    responses(
        (status = 200, description = "Image stored", body = UrlResponse),
        (status = 400, description = "Missing file or malformed form"),
        (status = 409, description = "Staged file is already being uploaded"),
        (status = 413, description = "File too large"),
        (status = 422, description = "Crop failed"),
        (status = 503, description = "Storage not configured")
    ),
    tag = "upload"
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UrlResponse>, AppError> {
    // Fail before receiving anything
    if !state.uploads.storage_configured() {
        return Err(AppError::NotConfigured("storage".to_string()));
    }

    let form = UploadForm::read(&mut multipart, state.temp_store.as_ref()).await?;
    let client_id = form.field("id").map(str::to_string);
    let crop = crop_region(&form)?;

    let file = form.file.map(|incoming| incoming.keep()).transpose()?;

    let url = state
        .uploads
        .upload(UploadRequest {
            client_id,
            file,
            crop,
        })
        .await?;

    Ok(Json(UrlResponse { url }))
}

fn crop_region(form: &UploadForm) -> Result<Option<CropRegion>, AppError> {
    let enabled = form
        .field("cropImage")
        .is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "off"));
    if !enabled {
        return Ok(None);
    }

    let coord = |name: &str| -> Result<i64, AppError> {
        let raw = form
            .field(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing {}", name)))?;
        // Croppers in the browser often post fractional pixels
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.round() as i64)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {}: {}", name, raw)))
    };

    Ok(Some(CropRegion {
        x: coord("crop[x]")?,
        y: coord("crop[y]")?,
        width: coord("crop[width]")?,
        height: coord("crop[height]")?,
    }))
}
