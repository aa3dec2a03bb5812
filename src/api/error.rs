use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing file")]
    MissingFile,

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Crop failed: {0}")]
    CropFailed(String),

    #[error("Upload failed with status {status:?}")]
    UploadFailed { status: Option<u16> },

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFile | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::CropFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            // Surface the storage status when it is a real error status
            AppError::UploadFailed { status } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::MissingFile => "Missing file".to_string(),
            AppError::PayloadTooLarge(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::CropFailed(msg)
            | AppError::NotFound(msg) => msg,
            AppError::UploadFailed { status } => {
                tracing::error!("Storage upload failed (status: {:?})", status);
                "Failure".to_string()
            }
            AppError::NotConfigured(what) => {
                tracing::error!("Missing {} credentials", what);
                format!("Missing {} credentials", what)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                "Internal Server Error".to_string()
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
