//! Knowledge ingestion pipeline.
//!
//! Coordinates the flow for one uploaded file: store the original on disk,
//! replace the file's database row and chunks in a transaction, then embed
//! the new chunks inline. Embedding is non-fatal: a failed batch leaves its
//! chunks unembedded (NULL BLOB) and the upload still succeeds.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::chunk::{chunk_text, TextChunk};
use crate::config::Config;
use crate::embedding;
use crate::models::KnowledgeFile;
use crate::storage;

pub struct IngestOutcome {
    pub file: KnowledgeFile,
    pub chunks_written: u64,
    pub chunks_embedded: u64,
    pub chunks_failed: u64,
}

pub struct PurgeOutcome {
    pub files_deleted: u64,
    pub chunks_deleted: u64,
}

/// Ingest one uploaded knowledge file for an agent.
///
/// `text` is the already-extracted document text; callers reject empty
/// extractions before getting here. Re-uploading a file name an agent already
/// has replaces the old row, chunks, and stored bytes.
pub async fn ingest_file(
    config: &Config,
    pool: &SqlitePool,
    agent_id: &str,
    file_name: &str,
    bytes: &[u8],
    text: &str,
    uploaded_by: &str,
) -> Result<IngestOutcome> {
    let stored_path = storage::store_knowledge_file(&config.storage, agent_id, bytes, file_name)?;
    let content_type = mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let now = chrono::Utc::now().timestamp();

    let file = KnowledgeFile {
        id: Uuid::new_v4().to_string(),
        agent_id: agent_id.to_string(),
        file_name: file_name.to_string(),
        stored_path,
        content_type,
        size_bytes: bytes.len() as i64,
        uploaded_by: Some(uploaded_by.to_string()),
        created_at: now,
    };

    let chunks = chunk_text(text, config.chunking.max_chars, config.chunking.overlap_chars);

    let old_stored_path = match replace_file(pool, &file, &chunks, now).await {
        Ok(old) => old,
        Err(e) => {
            // A failed swap leaves no row referencing the new bytes.
            storage::remove_stored_file(&config.storage, &file.stored_path);
            return Err(e);
        }
    };
    if let Some(old) = old_stored_path {
        storage::remove_stored_file(&config.storage, &old);
    }

    let chunks_written = chunks.len() as u64;
    let (chunks_embedded, chunks_failed) =
        embed_chunks_inline(config, pool, &file.id, &chunks).await;

    tracing::info!(
        agent_id,
        file_name,
        chunks_written,
        chunks_embedded,
        chunks_failed,
        "knowledge file ingested"
    );

    Ok(IngestOutcome {
        file,
        chunks_written,
        chunks_embedded,
        chunks_failed,
    })
}

/// Swap in the new file row and chunk rows atomically. Returns the stored
/// path of a replaced row so the caller can drop the stale bytes from disk.
async fn replace_file(
    pool: &SqlitePool,
    file: &KnowledgeFile,
    chunks: &[TextChunk],
    now: i64,
) -> Result<Option<String>> {
    let mut tx = pool.begin().await?;

    let old: Option<(String, String)> = sqlx::query_as(
        "SELECT id, stored_path FROM knowledge_files WHERE agent_id = ? AND file_name = ?",
    )
    .bind(&file.agent_id)
    .bind(&file.file_name)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some((old_id, _)) = &old {
        // Chunks go with the file row via ON DELETE CASCADE.
        sqlx::query("DELETE FROM knowledge_files WHERE id = ?")
            .bind(old_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO knowledge_files
            (id, agent_id, file_name, stored_path, content_type, size_bytes, uploaded_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&file.id)
    .bind(&file.agent_id)
    .bind(&file.file_name)
    .bind(&file.stored_path)
    .bind(&file.content_type)
    .bind(file.size_bytes)
    .bind(&file.uploaded_by)
    .bind(file.created_at)
    .execute(&mut *tx)
    .await?;

    for chunk in chunks {
        sqlx::query(
            r#"
            INSERT INTO knowledge_chunks
                (id, agent_id, file_id, file_name, chunk_index, text, text_hash, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&file.agent_id)
        .bind(&file.id)
        .bind(&file.file_name)
        .bind(chunk.index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(old.map(|(_, path)| path))
}

/// Embed freshly written chunks in batches, updating rows as batches land.
/// Returns `(embedded, failed)`; with the provider disabled both are 0 and
/// every chunk stays pending.
async fn embed_chunks_inline(
    config: &Config,
    pool: &SqlitePool,
    file_id: &str,
    chunks: &[TextChunk],
) -> (u64, u64) {
    if !config.embedding.is_enabled() || chunks.is_empty() {
        return (0, 0);
    }

    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match embedding::embed_texts(&config.embedding, &texts).await {
            Ok(vectors) => {
                for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vector);
                    let result = sqlx::query(
                        "UPDATE knowledge_chunks SET embedding = ? WHERE file_id = ? AND chunk_index = ?",
                    )
                    .bind(&blob)
                    .bind(file_id)
                    .bind(chunk.index)
                    .execute(pool)
                    .await;
                    match result {
                        Ok(_) => embedded += 1,
                        Err(e) => {
                            tracing::warn!(error = %e, chunk_index = chunk.index, "failed to store embedding");
                            failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, batch_len = batch.len(), "embedding batch failed, chunks left pending");
                failed += batch.len() as u64;
            }
        }
    }

    (embedded, failed)
}

/// Delete one knowledge file: its row (chunks cascade) and its stored bytes.
/// Returns how many chunks went with it.
pub async fn delete_file(
    config: &Config,
    pool: &SqlitePool,
    file_id: &str,
    stored_path: &str,
) -> Result<u64> {
    let chunks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks WHERE file_id = ?")
            .bind(file_id)
            .fetch_one(pool)
            .await?;

    sqlx::query("DELETE FROM knowledge_files WHERE id = ?")
        .bind(file_id)
        .execute(pool)
        .await?;

    storage::remove_stored_file(&config.storage, stored_path);
    Ok(chunks as u64)
}

/// Drop every knowledge file and chunk an agent has, plus the on-disk
/// originals.
pub async fn purge_agent(
    config: &Config,
    pool: &SqlitePool,
    agent_id: &str,
) -> Result<PurgeOutcome> {
    let files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_files WHERE agent_id = ?")
        .bind(agent_id)
        .fetch_one(pool)
        .await?;
    let chunks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_one(pool)
            .await?;

    sqlx::query("DELETE FROM knowledge_files WHERE agent_id = ?")
        .bind(agent_id)
        .execute(pool)
        .await?;

    storage::remove_agent_knowledge(&config.storage, agent_id);

    tracing::info!(agent_id, files, chunks, "knowledge purged");

    Ok(PurgeOutcome {
        files_deleted: files as u64,
        chunks_deleted: chunks as u64,
    })
}
