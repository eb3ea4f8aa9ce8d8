//! Content type CRUD, scoped to the calling user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::ContentType;
use crate::server::AppState;
use crate::storage;

#[derive(Deserialize)]
pub struct ContentTypePayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar_path: Option<String>,
}

fn validate(payload: &ContentTypePayload) -> ApiResult<()> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    if let Some(avatar) = &payload.avatar_path {
        if !storage::is_safe_file_name(avatar) {
            return Err(ApiError::bad_request("invalid avatar_path"));
        }
    }
    Ok(())
}

fn content_type_from_row(row: &SqliteRow) -> ContentType {
    ContentType {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        avatar_path: row.get("avatar_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const CONTENT_TYPE_COLUMNS: &str =
    "id, user_id, name, description, avatar_path, created_at, updated_at";

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ContentType>>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM content_types WHERE user_id = ? ORDER BY name COLLATE NOCASE",
        CONTENT_TYPE_COLUMNS
    ))
    .bind(&user.user_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows.iter().map(content_type_from_row).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ContentType>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM content_types WHERE id = ? AND user_id = ?",
        CONTENT_TYPE_COLUMNS
    ))
    .bind(&id)
    .bind(&user.user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("no such content type"))?;
    Ok(Json(content_type_from_row(&row)))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ContentTypePayload>,
) -> ApiResult<Json<ContentType>> {
    validate(&payload)?;
    let now = chrono::Utc::now().timestamp();
    let content_type = ContentType {
        id: Uuid::new_v4().to_string(),
        user_id: user.user_id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        avatar_path: payload.avatar_path,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO content_types (id, user_id, name, description, avatar_path, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&content_type.id)
    .bind(&content_type.user_id)
    .bind(&content_type.name)
    .bind(&content_type.description)
    .bind(&content_type.avatar_path)
    .bind(content_type.created_at)
    .bind(content_type.updated_at)
    .execute(&state.pool)
    .await?;

    Ok(Json(content_type))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<ContentTypePayload>,
) -> ApiResult<Json<ContentType>> {
    validate(&payload)?;
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        UPDATE content_types
        SET name = ?, description = ?, avatar_path = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(&payload.avatar_path)
    .bind(now)
    .bind(&id)
    .bind(&user.user_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such content type"));
    }

    let row = sqlx::query(&format!(
        "SELECT {} FROM content_types WHERE id = ?",
        CONTENT_TYPE_COLUMNS
    ))
    .bind(&id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(content_type_from_row(&row)))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM content_types WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such content type"));
    }
    Ok(StatusCode::NO_CONTENT)
}
