//! Knowledge endpoints: upload, list, delete, purge, and semantic search.
//!
//! Files arrive as JSON with base64 content rather than multipart, which
//! keeps browser clients and the API test suite on the same plain-JSON
//! code path.

use axum::extract::{Path, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{self, KNOWLEDGE_EXTENSIONS};
use crate::ingest;
use crate::models::{KnowledgeFile, ScoredChunk};
use crate::retrieval;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_base64: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub file: KnowledgeFile,
    pub chunks_written: u64,
    pub chunks_embedded: u64,
    pub chunks_failed: u64,
}

#[derive(Serialize)]
pub struct KnowledgeFileEntry {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<String>,
    pub created_at: i64,
    pub chunk_count: i64,
    pub embedded_count: i64,
}

#[derive(Serialize)]
pub struct DeleteFileResponse {
    pub chunks_deleted: u64,
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub files_deleted: u64,
    pub chunks_deleted: u64,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredChunk>,
}

async fn require_agent(state: &AppState, agent_id: &str) -> ApiResult<()> {
    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM agents WHERE id = ?")
        .bind(agent_id)
        .fetch_optional(&state.pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("no such agent"));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Vec<KnowledgeFileEntry>>> {
    require_agent(&state, &agent_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT f.id, f.file_name, f.content_type, f.size_bytes, f.uploaded_by, f.created_at,
               COUNT(c.id) AS chunk_count,
               COALESCE(SUM(CASE WHEN c.embedding IS NOT NULL THEN 1 ELSE 0 END), 0) AS embedded_count
        FROM knowledge_files f
        LEFT JOIN knowledge_chunks c ON c.file_id = f.id
        WHERE f.agent_id = ?
        GROUP BY f.id
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(&agent_id)
    .fetch_all(&state.pool)
    .await?;

    let entries = rows
        .iter()
        .map(|row| KnowledgeFileEntry {
            id: row.get("id"),
            file_name: row.get("file_name"),
            content_type: row.get("content_type"),
            size_bytes: row.get("size_bytes"),
            uploaded_by: row.get("uploaded_by"),
            created_at: row.get("created_at"),
            chunk_count: row.get("chunk_count"),
            embedded_count: row.get("embedded_count"),
        })
        .collect();

    Ok(Json(entries))
}

pub async fn upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(agent_id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    require_agent(&state, &agent_id).await?;

    let file_name = req.file_name.trim();
    if file_name.is_empty() {
        return Err(ApiError::bad_request("file_name must not be empty"));
    }
    match extract::file_extension(file_name) {
        Some(ext) if KNOWLEDGE_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => {
            return Err(ApiError::bad_request(format!(
                "unsupported file format; accepted: {}",
                KNOWLEDGE_EXTENSIONS.join(", ")
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

    let text = extract::extract_text(&bytes, file_name)
        .map_err(|e| ApiError::bad_request(format!("could not extract text: {}", e)))?;
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("no extractable text in file"));
    }

    let outcome = ingest::ingest_file(
        &state.config,
        &state.pool,
        &agent_id,
        file_name,
        &bytes,
        &text,
        &admin.user_id,
    )
    .await?;

    Ok(Json(UploadResponse {
        file: outcome.file,
        chunks_written: outcome.chunks_written,
        chunks_embedded: outcome.chunks_embedded,
        chunks_failed: outcome.chunks_failed,
    }))
}

pub async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((agent_id, file_id)): Path<(String, String)>,
) -> ApiResult<Json<DeleteFileResponse>> {
    let row = sqlx::query(
        "SELECT id, stored_path FROM knowledge_files WHERE id = ? AND agent_id = ?",
    )
    .bind(&file_id)
    .bind(&agent_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("no such knowledge file"))?;

    let stored_path: String = row.get("stored_path");
    let chunks_deleted =
        ingest::delete_file(&state.config, &state.pool, &file_id, &stored_path).await?;

    Ok(Json(DeleteFileResponse { chunks_deleted }))
}

pub async fn purge(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<PurgeResponse>> {
    require_agent(&state, &agent_id).await?;

    let outcome = ingest::purge_agent(&state.config, &state.pool, &agent_id).await?;
    Ok(Json(PurgeResponse {
        files_deleted: outcome.files_deleted,
        chunks_deleted: outcome.chunks_deleted,
    }))
}

pub async fn search(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(agent_id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    require_agent(&state, &agent_id).await?;

    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }
    if !state.config.embedding.is_enabled() {
        return Err(ApiError::embeddings_disabled());
    }

    let top_k = match req.top_k {
        Some(0) => return Err(ApiError::bad_request("top_k must be at least 1")),
        Some(k) => k.min(100),
        None => state.config.retrieval.top_k,
    };

    let results = retrieval::search_chunks(&state.config, &state.pool, &agent_id, query, top_k)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(SearchResponse { results }))
}
