use std::path::PathBuf;

use anyhow::Context;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StoredFile {
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

/// File extension for each accepted content type.
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

/// Accepts one multipart `file` field (listing photos, avatars, verification
/// documents) and stores it under `<upload_dir>/<user_id>/`.
pub async fn upload_file(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<StoredFile>)> {
    let mut multipart = multipart.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let max_bytes = state.config.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let extension = extension_for(&content_type).ok_or_else(|| {
            ApiError::BadRequest(format!("Unsupported file type: {content_type}"))
        })?;
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(err.body_text()))?;
        if data.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }
        if data.len() > max_bytes {
            return Err(ApiError::BadRequest(format!(
                "File exceeds the {max_bytes} byte limit"
            )));
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let dir = PathBuf::from(&state.config.upload_dir).join(user.id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating upload directory {}", dir.display()))?;
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("writing upload {}", path.display()))?;
        log::info!("Stored {} byte upload at {}", data.len(), path.display());

        let url = format!(
            "{}/files/{}/{}",
            state.config.public_base_url.trim_end_matches('/'),
            user.id,
            file_name
        );
        return Ok((
            StatusCode::CREATED,
            Json(StoredFile {
                url,
                content_type,
                size: data.len(),
            }),
        ));
    }

    Err(ApiError::bad_request("file is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_and_pdfs_are_accepted() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("application/pdf"), Some("pdf"));
        assert_eq!(extension_for("text/html"), None);
        assert_eq!(extension_for(""), None);
    }
}
