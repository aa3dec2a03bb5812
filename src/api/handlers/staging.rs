use crate::AppState;
use crate::api::error::AppError;
use crate::api::form::UploadForm;
use crate::models::AckResponse;
use axum::{
    Json,
    extract::{Multipart, State},
};

#[utoipa::path(
    post,
    path = "/preupload",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "`id` (client id) and `file`"
    ),
    responses(
        (status = 200, description = "File staged for the client", body = AckResponse),
        (status = 400, description = "Malformed form"),
        (status = 413, description = "Request body too large")
    ),
    tag = "upload"
)]
pub async fn pre_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AckResponse>, AppError> {
    let form = UploadForm::read(&mut multipart, state.temp_store.as_ref()).await?;
    let client_id = form.field("id").map(str::to_string);

    match (client_id, form.file) {
        (Some(client_id), Some(incoming)) => {
            let file = incoming.keep()?;
            state.staging.pre_upload(&client_id, file).await;
        }
        (None, Some(incoming)) => {
            // Nobody to stage it for; dropping it deletes the file
            tracing::warn!(
                "Pre-upload of {} bytes without a client id, discarding",
                incoming.size()
            );
        }
        (_, None) => tracing::debug!("Pre-upload without a file part"),
    }

    Ok(Json(AckResponse::new("Received file")))
}

#[utoipa::path(
    post,
    path = "/clearfile",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "`id` (client id)"
    ),
    responses(
        (status = 200, description = "Staged file cleared", body = AckResponse),
        (status = 400, description = "Missing client id")
    ),
    tag = "upload"
)]
pub async fn clear_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AckResponse>, AppError> {
    let form = UploadForm::read(&mut multipart, state.temp_store.as_ref()).await?;
    let client_id = form
        .field("id")
        .ok_or_else(|| AppError::BadRequest("Missing client id".to_string()))?;

    state.staging.clear_staged_file(client_id).await;
    Ok(Json(AckResponse::new("Cleared")))
}
