//! Upload API endpoints
//!
//! - POST /api/admin/upload - multipart/form-data with a `file` field
//! - POST /api/admin/upload/base64 - JSON `{ "data": "data:image/png;base64,..." }`
//!
//! Returned URLs can be used as book covers, tutorial thumbnails or book files.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::log_activity;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::StoredFile;

#[derive(Debug, Deserialize)]
pub struct Base64UploadRequest {
    /// `data:` URL or bare base64
    #[serde(alias = "file", alias = "image")]
    pub data: String,
}

/// Build the upload router (editor middleware applied by the caller)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/upload", post(upload_file))
        .route("/admin/upload/base64", post(upload_base64))
}

/// POST /api/admin/upload
async fn upload_file(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let stored = state.uploads.save_bytes(&data, &content_type).await?;
        log_activity(&state, user.id, "upload", "file", None, Some(&original)).await;
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(ApiError::validation_error("No file provided"))
}

/// POST /api/admin/upload/base64
async fn upload_base64(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<Base64UploadRequest>,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    let stored = state.uploads.save_data_url(&body.data).await?;
    log_activity(&state, user.id, "upload", "file", None, Some(&stored.filename)).await;
    Ok((StatusCode::CREATED, Json(stored)))
}
