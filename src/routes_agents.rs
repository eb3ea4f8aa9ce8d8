//! Agent CRUD.
//!
//! Agents are global: every signed-in user can list and read them, only
//! admins create, update, or delete. Deleting an agent cascades its
//! knowledge and nulls out references from existing chats.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::models::Agent;
use crate::server::AppState;
use crate::storage;

#[derive(Deserialize)]
pub struct AgentPayload {
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub avatar_path: Option<String>,
}

fn validate(payload: &AgentPayload) -> ApiResult<()> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    if payload.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }
    if let Some(t) = payload.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(ApiError::bad_request("temperature must be between 0 and 2"));
        }
    }
    if let Some(avatar) = &payload.avatar_path {
        if !storage::is_safe_file_name(avatar) {
            return Err(ApiError::bad_request("invalid avatar_path"));
        }
    }
    Ok(())
}

fn agent_from_row(row: &SqliteRow) -> Agent {
    Agent {
        id: row.get("id"),
        name: row.get("name"),
        prompt: row.get("prompt"),
        description: row.get("description"),
        temperature: row.get("temperature"),
        avatar_path: row.get("avatar_path"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const AGENT_COLUMNS: &str =
    "id, name, prompt, description, temperature, avatar_path, created_by, created_at, updated_at";

pub async fn list(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Json<Vec<Agent>>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM agents ORDER BY name COLLATE NOCASE",
        AGENT_COLUMNS
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows.iter().map(agent_from_row).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Agent>> {
    let row = sqlx::query(&format!("SELECT {} FROM agents WHERE id = ?", AGENT_COLUMNS))
        .bind(&id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("no such agent"))?;
    Ok(Json(agent_from_row(&row)))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<AgentPayload>,
) -> ApiResult<Json<Agent>> {
    validate(&payload)?;
    let now = chrono::Utc::now().timestamp();
    let agent = Agent {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        prompt: payload.prompt,
        description: payload.description,
        temperature: payload.temperature,
        avatar_path: payload.avatar_path,
        created_by: Some(admin.user_id),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO agents (id, name, prompt, description, temperature, avatar_path, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&agent.id)
    .bind(&agent.name)
    .bind(&agent.prompt)
    .bind(&agent.description)
    .bind(agent.temperature)
    .bind(&agent.avatar_path)
    .bind(&agent.created_by)
    .bind(agent.created_at)
    .bind(agent.updated_at)
    .execute(&state.pool)
    .await?;

    tracing::info!(agent_id = %agent.id, name = %agent.name, "agent created");
    Ok(Json(agent))
}

pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<AgentPayload>,
) -> ApiResult<Json<Agent>> {
    validate(&payload)?;
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        UPDATE agents
        SET name = ?, prompt = ?, description = ?, temperature = ?, avatar_path = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.prompt)
    .bind(&payload.description)
    .bind(payload.temperature)
    .bind(&payload.avatar_path)
    .bind(now)
    .bind(&id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such agent"));
    }

    let row = sqlx::query(&format!("SELECT {} FROM agents WHERE id = ?", AGENT_COLUMNS))
        .bind(&id)
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(agent_from_row(&row)))
}

pub async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM agents WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such agent"));
    }

    // Rows cascade; the stored originals need explicit cleanup.
    storage::remove_agent_knowledge(&state.config.storage, &id);
    tracing::info!(agent_id = %id, "agent deleted");
    Ok(StatusCode::NO_CONTENT)
}
