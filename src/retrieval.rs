//! Semantic retrieval over an agent's knowledge chunks.
//!
//! The query is embedded once, then every embedded chunk the agent has is
//! loaded and scored with cosine similarity in process. Corpora here are a
//! handful of documents per agent, so a linear scan beats maintaining an
//! index.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::embedding;
use crate::models::ScoredChunk;

/// Return the agent's `top_k` most similar chunks at or above
/// `min_similarity`, best first. Chunks without an embedding are invisible
/// here until an embedding pass picks them up.
pub async fn search_chunks(
    config: &Config,
    pool: &SqlitePool,
    agent_id: &str,
    query: &str,
    top_k: usize,
) -> Result<Vec<ScoredChunk>> {
    let query_vec = embedding::embed_query(&config.embedding, query).await?;
    rank_chunks(config, pool, agent_id, &query_vec, top_k).await
}

/// Score chunks against an already-embedded query.
pub async fn rank_chunks(
    config: &Config,
    pool: &SqlitePool,
    agent_id: &str,
    query_vec: &[f32],
    top_k: usize,
) -> Result<Vec<ScoredChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT file_id, file_name, chunk_index, text, embedding
        FROM knowledge_chunks
        WHERE agent_id = ? AND embedding IS NOT NULL
        "#,
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;

    let min_similarity = config.retrieval.min_similarity;

    let mut scored: Vec<ScoredChunk> = rows
        .iter()
        .filter_map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            let score = embedding::cosine_similarity(query_vec, &vec);
            if score < min_similarity {
                return None;
            }
            Some(ScoredChunk {
                file_id: row.get("file_id"),
                file_name: row.get("file_name"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                score,
            })
        })
        .collect();

    // Ties sort by chunk identity so equal scores come back in a stable
    // order across runs.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_id.cmp(&b.file_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    scored.truncate(top_k);

    Ok(scored)
}
