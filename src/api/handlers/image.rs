use crate::AppState;
use crate::api::error::AppError;
use crate::utils::naming::is_valid_file_name;
use axum::{
    extract::{Path, State},
    response::Redirect,
};

#[utoipa::path(
    get,
    path = "/{file_name}",
    params(
        ("file_name" = String, Path, description = "Generated image file name")
    ),
    responses(
        (status = 307, description = "Redirect to the stored image"),
        (status = 404, description = "Not an image name"),
        (status = 503, description = "Storage not configured")
    ),
    tag = "images"
)]
pub async fn show_image(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Redirect, AppError> {
    if !is_valid_file_name(&file_name) {
        return Err(AppError::NotFound("Not found".to_string()));
    }
    let storage = state
        .storage
        .as_ref()
        .ok_or_else(|| AppError::NotConfigured("storage".to_string()))?;

    Ok(Redirect::temporary(&storage.public_url(&file_name)))
}
