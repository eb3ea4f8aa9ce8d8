//! Avatar upload and serving.
//!
//! Uploads are JSON + base64 like knowledge files. Stored avatars get UUID
//! names; entities reference them through their `avatar_path` field and the
//! image itself is served unauthenticated so plain `<img>` tags work.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::storage::{self, AVATAR_EXTENSIONS};

#[derive(Deserialize)]
pub struct AvatarUploadRequest {
    pub file_name: String,
    pub content_base64: String,
}

#[derive(Serialize)]
pub struct AvatarUploadResponse {
    pub file_name: String,
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<AvatarUploadRequest>,
) -> ApiResult<Json<AvatarUploadResponse>> {
    let original_name = req.file_name.trim();
    if original_name.is_empty() {
        return Err(ApiError::bad_request("file_name must not be empty"));
    }
    match crate::extract::file_extension(original_name) {
        Some(ext) if AVATAR_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => {
            return Err(ApiError::bad_request(format!(
                "unsupported avatar format; accepted: {}",
                AVATAR_EXTENSIONS.join(", ")
            )))
        }
    }

    let bytes = BASE64
        .decode(req.content_base64.as_bytes())
        .map_err(|_| ApiError::bad_request("content_base64 is not valid base64"))?;

    if bytes.len() > state.config.storage.max_upload_bytes {
        return Err(ApiError::payload_too_large(format!(
            "file exceeds the {} byte upload limit",
            state.config.storage.max_upload_bytes
        )));
    }

    let stored = storage::store_avatar(&state.config.storage, &bytes, original_name)?;

    Ok(Json(AvatarUploadResponse { file_name: stored }))
}

pub async fn get_avatar(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    if !storage::is_safe_file_name(&name) {
        return Err(ApiError::bad_request("invalid avatar name"));
    }

    let bytes = storage::load_avatar(&state.config.storage, &name)?
        .ok_or_else(|| ApiError::not_found("no such avatar"))?;

    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.essence_str())], bytes).into_response())
}
