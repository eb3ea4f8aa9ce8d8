//! Expert profile CRUD, scoped to the calling user.
//!
//! Every query filters on `user_id`, so another tenant's expert is
//! indistinguishable from a missing one: both are 404.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::Expert;
use crate::server::AppState;
use crate::storage;

#[derive(Deserialize)]
pub struct ExpertPayload {
    pub name: String,
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub deliverables: String,
    #[serde(default)]
    pub benefits: String,
    #[serde(default)]
    pub objections: String,
    #[serde(default)]
    pub avatar_path: Option<String>,
}

fn validate(payload: &ExpertPayload) -> ApiResult<()> {
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

fn expert_from_row(row: &SqliteRow) -> Expert {
    Expert {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        niche: row.get("niche"),
        target_audience: row.get("target_audience"),
        deliverables: row.get("deliverables"),
        benefits: row.get("benefits"),
        objections: row.get("objections"),
        avatar_path: row.get("avatar_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const EXPERT_COLUMNS: &str = "id, user_id, name, niche, target_audience, deliverables, benefits, objections, avatar_path, created_at, updated_at";

pub async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Expert>>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM experts WHERE user_id = ? ORDER BY name COLLATE NOCASE",
        EXPERT_COLUMNS
    ))
    .bind(&user.user_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows.iter().map(expert_from_row).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Expert>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM experts WHERE id = ? AND user_id = ?",
        EXPERT_COLUMNS
    ))
    .bind(&id)
    .bind(&user.user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("no such expert"))?;
    Ok(Json(expert_from_row(&row)))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ExpertPayload>,
) -> ApiResult<Json<Expert>> {
    validate(&payload)?;
    let now = chrono::Utc::now().timestamp();
    let expert = Expert {
        id: Uuid::new_v4().to_string(),
        user_id: user.user_id,
        name: payload.name.trim().to_string(),
        niche: payload.niche,
        target_audience: payload.target_audience,
        deliverables: payload.deliverables,
        benefits: payload.benefits,
        objections: payload.objections,
        avatar_path: payload.avatar_path,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO experts
            (id, user_id, name, niche, target_audience, deliverables, benefits, objections, avatar_path, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&expert.id)
    .bind(&expert.user_id)
    .bind(&expert.name)
    .bind(&expert.niche)
    .bind(&expert.target_audience)
    .bind(&expert.deliverables)
    .bind(&expert.benefits)
    .bind(&expert.objections)
    .bind(&expert.avatar_path)
    .bind(expert.created_at)
    .bind(expert.updated_at)
    .execute(&state.pool)
    .await?;

    Ok(Json(expert))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<ExpertPayload>,
) -> ApiResult<Json<Expert>> {
    validate(&payload)?;
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        UPDATE experts
        SET name = ?, niche = ?, target_audience = ?, deliverables = ?, benefits = ?, objections = ?, avatar_path = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.niche)
    .bind(&payload.target_audience)
    .bind(&payload.deliverables)
    .bind(&payload.benefits)
    .bind(&payload.objections)
    .bind(&payload.avatar_path)
    .bind(now)
    .bind(&id)
    .bind(&user.user_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such expert"));
    }

    let row = sqlx::query(&format!(
        "SELECT {} FROM experts WHERE id = ?",
        EXPERT_COLUMNS
    ))
    .bind(&id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(expert_from_row(&row)))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM experts WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such expert"));
    }
    Ok(StatusCode::NO_CONTENT)
}
