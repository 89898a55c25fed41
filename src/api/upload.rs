//! Upload API endpoints
//!
//! - POST /api/v1/upload/{kind} (editors)
//!
//! `kind` selects the subdirectory under the upload root. Files are stored as
//! `<uuid>.<ext>` with the extension taken from the MIME type; stored files
//! are served from `/uploads/<kind>/<file>`.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppPath, AppState, AuthenticatedUser};

/// Headroom for multipart boundaries and headers on top of the file size
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Upload destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Blog,
    Team,
    Executive,
    Testimonial,
    General,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Blog => "blog",
            UploadKind::Team => "team",
            UploadKind::Executive => "executive",
            UploadKind::Testimonial => "testimonial",
            UploadKind::General => "general",
        }
    }
}

/// Response for successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// Build the upload router
pub fn router(max_file_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);
    Router::new()
        .route("/{kind}", post(upload_file))
        .layer(DefaultBodyLimit::max(limit))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File exceeds the maximum upload size")
    } else {
        ApiError::bad_request(format!("Failed to read multipart: {}", e.body_text()))
    }
}

/// POST /api/v1/upload/{kind} - Upload a single file
///
/// Accepts multipart/form-data; the first field named `file` or `files`
/// is stored.
async fn upload_file(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(kind): AppPath<UploadKind>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        ApiError::unsupported_media_type(format!("Expected multipart/form-data: {}", e.body_text()))
    })?;
    let config = &state.upload_config;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("");
        if name != "file" && name != "files" {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !config.is_type_allowed(&content_type) {
            return Err(ApiError::unsupported_media_type(format!(
                "File type {} is not allowed. Allowed types: {}",
                content_type,
                config.allowed_types.join(", ")
            )));
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if (data.len() + chunk.len()) as u64 > config.max_file_size {
                return Err(ApiError::payload_too_large(format!(
                    "File too large. Maximum size: {} bytes",
                    config.max_file_size
                )));
            }
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }

        let dir = config.path.join(kind.as_str());
        ensure_upload_dir(&dir).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), config.get_extension(&content_type));
        fs::write(dir.join(&filename), &data)
            .await
            .map_err(ApiError::internal)?;

        tracing::info!(
            user_id = user.id,
            kind = kind.as_str(),
            file = %filename,
            size = data.len(),
            "File uploaded"
        );

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("/uploads/{}/{}", kind.as_str(), filename),
                filename,
                size: data.len() as u64,
                content_type,
            }),
        ));
    }

    Err(ApiError::bad_request("No file provided"))
}

/// Ensure upload directory exists
async fn ensure_upload_dir(path: &Path) -> Result<(), ApiError> {
    fs::create_dir_all(path).await.map_err(ApiError::internal)
}
