//! Chat CRUD and the copy-generation endpoint.
//!
//! Sending a message persists the user's turn first, then retrieves
//! knowledge, assembles the prompt, and calls the completion vendor. The
//! user message survives a vendor failure so the conversation can be
//! retried; retrieval problems degrade to generating without knowledge.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::completion;
use crate::error::{ApiError, ApiResult};
use crate::models::{Agent, Chat, ContentType, Expert, Message};
use crate::prompt::{build_messages, PromptInputs};
use crate::retrieval;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct CreateChatRequest {
    pub agent_id: String,
    #[serde(default)]
    pub expert_id: Option<String>,
    #[serde(default)]
    pub content_type_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct RenameChatRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub user_message: Message,
    pub assistant_message: Message,
    pub knowledge_used: usize,
}

fn chat_from_row(row: &SqliteRow) -> Chat {
    Chat {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        agent_id: row.get("agent_id"),
        expert_id: row.get("expert_id"),
        content_type_id: row.get("content_type_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn message_from_row(row: &SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        role: row.get("role"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

const CHAT_COLUMNS: &str =
    "id, user_id, title, agent_id, expert_id, content_type_id, created_at, updated_at";

async fn load_owned_chat(state: &AppState, user_id: &str, chat_id: &str) -> ApiResult<Chat> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM chats WHERE id = ? AND user_id = ?",
        CHAT_COLUMNS
    ))
    .bind(chat_id)
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("no such chat"))?;
    Ok(chat_from_row(&row))
}

pub async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Chat>>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM chats WHERE user_id = ? ORDER BY updated_at DESC",
        CHAT_COLUMNS
    ))
    .bind(&user.user_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows.iter().map(chat_from_row).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateChatRequest>,
) -> ApiResult<Json<Chat>> {
    let agent_exists: Option<String> = sqlx::query_scalar("SELECT id FROM agents WHERE id = ?")
        .bind(&req.agent_id)
        .fetch_optional(&state.pool)
        .await?;
    if agent_exists.is_none() {
        return Err(ApiError::bad_request("no such agent"));
    }

    if let Some(expert_id) = &req.expert_id {
        let owned: Option<String> =
            sqlx::query_scalar("SELECT id FROM experts WHERE id = ? AND user_id = ?")
                .bind(expert_id)
                .bind(&user.user_id)
                .fetch_optional(&state.pool)
                .await?;
        if owned.is_none() {
            return Err(ApiError::bad_request("no such expert"));
        }
    }

    if let Some(content_type_id) = &req.content_type_id {
        let owned: Option<String> =
            sqlx::query_scalar("SELECT id FROM content_types WHERE id = ? AND user_id = ?")
                .bind(content_type_id)
                .bind(&user.user_id)
                .fetch_optional(&state.pool)
                .await?;
        if owned.is_none() {
            return Err(ApiError::bad_request("no such content type"));
        }
    }

    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("New chat")
        .to_string();

    let now = chrono::Utc::now().timestamp();
    let chat = Chat {
        id: Uuid::new_v4().to_string(),
        user_id: user.user_id,
        title,
        agent_id: Some(req.agent_id),
        expert_id: req.expert_id,
        content_type_id: req.content_type_id,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO chats (id, user_id, title, agent_id, expert_id, content_type_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&chat.id)
    .bind(&chat.user_id)
    .bind(&chat.title)
    .bind(&chat.agent_id)
    .bind(&chat.expert_id)
    .bind(&chat.content_type_id)
    .bind(chat.created_at)
    .bind(chat.updated_at)
    .execute(&state.pool)
    .await?;

    Ok(Json(chat))
}

pub async fn get_one(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Chat>> {
    let chat = load_owned_chat(&state, &user.user_id, &id).await?;
    Ok(Json(chat))
}

pub async fn rename(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<RenameChatRequest>,
) -> ApiResult<Json<Chat>> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("title must not be empty"));
    }

    let result = sqlx::query(
        "UPDATE chats SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(title)
    .bind(chrono::Utc::now().timestamp())
    .bind(&id)
    .bind(&user.user_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such chat"));
    }

    let chat = load_owned_chat(&state, &user.user_id, &id).await?;
    Ok(Json(chat))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM chats WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("no such chat"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let chat = load_owned_chat(&state, &user.user_id, &id).await?;
    // created_at is whole seconds; rowid keeps same-second messages in
    // insertion order.
    let rows = sqlx::query(
        "SELECT id, chat_id, role, content, created_at FROM messages WHERE chat_id = ? ORDER BY created_at, rowid",
    )
    .bind(&chat.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows.iter().map(message_from_row).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<SendMessageResponse>> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::bad_request("message content must not be empty"));
    }

    let chat = load_owned_chat(&state, &user.user_id, &id).await?;

    let agent = match &chat.agent_id {
        Some(agent_id) => load_agent(&state, agent_id).await?,
        None => None,
    };
    let agent = agent.ok_or_else(|| {
        ApiError::bad_request("chat has no agent; its agent was deleted")
    })?;

    let expert = match &chat.expert_id {
        Some(expert_id) => load_expert(&state, expert_id).await?,
        None => None,
    };
    let content_type = match &chat.content_type_id {
        Some(content_type_id) => load_content_type(&state, content_type_id).await?,
        None => None,
    };

    // Prior turns, oldest first; the incoming message is appended by the
    // prompt builder.
    let history_rows = sqlx::query(
        "SELECT id, chat_id, role, content, created_at FROM messages WHERE chat_id = ? ORDER BY created_at, rowid",
    )
    .bind(&chat.id)
    .fetch_all(&state.pool)
    .await?;
    let history: Vec<Message> = history_rows.iter().map(message_from_row).collect();

    // The user's turn is committed before any vendor call; a failed
    // generation must not lose what they typed.
    let user_message = insert_message(&state, &chat.id, "user", &content).await?;

    let knowledge = if state.config.embedding.is_enabled() {
        match retrieval::search_chunks(
            &state.config,
            &state.pool,
            &agent.id,
            &content,
            state.config.retrieval.top_k,
        )
        .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, chat_id = %chat.id, "retrieval failed, generating without knowledge");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let inputs = PromptInputs {
        agent_prompt: &agent.prompt,
        expert: expert.as_ref(),
        content_type: content_type.as_ref(),
        knowledge: &knowledge,
        history: &history,
        user_message: &content,
    };
    let assembled = build_messages(
        &inputs,
        state.config.retrieval.max_knowledge_chars,
        state.config.retrieval.max_history_messages,
    );

    let temperature = agent
        .temperature
        .unwrap_or(state.config.completion.default_temperature);

    let reply = completion::complete_chat(&state.config.completion, &assembled.messages, temperature)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, chat_id = %chat.id, "completion failed");
            ApiError::completion_failed(e.to_string())
        })?;

    let assistant_message = insert_message(&state, &chat.id, "assistant", &reply).await?;

    tracing::info!(
        chat_id = %chat.id,
        knowledge_used = assembled.knowledge_used,
        "copy generated"
    );

    Ok(Json(SendMessageResponse {
        user_message,
        assistant_message,
        knowledge_used: assembled.knowledge_used,
    }))
}

async fn insert_message(
    state: &AppState,
    chat_id: &str,
    role: &str,
    content: &str,
) -> ApiResult<Message> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        role: role.to_string(),
        content: content.to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };

    let mut tx = state.pool.begin().await?;
    sqlx::query(
        "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.chat_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(message.created_at)
    .execute(&mut *tx)
    .await?;
    sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
        .bind(message.created_at)
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(message)
}

async fn load_agent(state: &AppState, id: &str) -> ApiResult<Option<Agent>> {
    let row = sqlx::query(
        "SELECT id, name, prompt, description, temperature, avatar_path, created_by, created_at, updated_at FROM agents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;
    Ok(row.map(|r| Agent {
        id: r.get("id"),
        name: r.get("name"),
        prompt: r.get("prompt"),
        description: r.get("description"),
        temperature: r.get("temperature"),
        avatar_path: r.get("avatar_path"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }))
}

async fn load_expert(state: &AppState, id: &str) -> ApiResult<Option<Expert>> {
    let row = sqlx::query(
        "SELECT id, user_id, name, niche, target_audience, deliverables, benefits, objections, avatar_path, created_at, updated_at FROM experts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;
    Ok(row.map(|r| Expert {
        id: r.get("id"),
        user_id: r.get("user_id"),
        name: r.get("name"),
        niche: r.get("niche"),
        target_audience: r.get("target_audience"),
        deliverables: r.get("deliverables"),
        benefits: r.get("benefits"),
        objections: r.get("objections"),
        avatar_path: r.get("avatar_path"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }))
}

async fn load_content_type(state: &AppState, id: &str) -> ApiResult<Option<ContentType>> {
    let row = sqlx::query(
        "SELECT id, user_id, name, description, avatar_path, created_at, updated_at FROM content_types WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;
    Ok(row.map(|r| ContentType {
        id: r.get("id"),
        user_id: r.get("user_id"),
        name: r.get("name"),
        description: r.get("description"),
        avatar_path: r.get("avatar_path"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }))
}
