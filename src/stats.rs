//! Database statistics overview.
//!
//! Summarizes what the instance holds: accounts, profiles, chats, and
//! knowledge/embedding coverage per agent. Used by `copymode stats` to check
//! that ingestion and embedding are working as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Per-agent breakdown of knowledge coverage.
struct AgentStats {
    name: String,
    file_count: i64,
    chunk_count: i64,
    embedded_count: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await?;
    let agents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agents")
        .fetch_one(&pool)
        .await?;
    let experts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM experts")
        .fetch_one(&pool)
        .await?;
    let content_types: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_types")
        .fetch_one(&pool)
        .await?;
    let chats: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats")
        .fetch_one(&pool)
        .await?;
    let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&pool)
        .await?;
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
        .fetch_one(&pool)
        .await?;
    let total_embedded: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM knowledge_chunks WHERE embedding IS NOT NULL",
    )
    .fetch_one(&pool)
    .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Copy Mode — Database Stats");
    println!("==========================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Users:         {}", users);
    println!("  Agents:        {}", agents);
    println!("  Experts:       {}", experts);
    println!("  Content types: {}", content_types);
    println!("  Chats:         {} ({} messages)", chats, messages);
    println!(
        "  Embedded:      {} / {} chunks ({}%)",
        total_embedded,
        total_chunks,
        if total_chunks > 0 {
            (total_embedded * 100) / total_chunks
        } else {
            0
        }
    );

    // Per-agent knowledge breakdown
    let agent_rows = sqlx::query(
        r#"
        SELECT
            a.name,
            COUNT(DISTINCT f.id) AS file_count,
            COUNT(DISTINCT c.id) AS chunk_count,
            COUNT(DISTINCT CASE WHEN c.embedding IS NOT NULL THEN c.id END) AS embedded_count
        FROM agents a
        LEFT JOIN knowledge_files f ON f.agent_id = a.id
        LEFT JOIN knowledge_chunks c ON c.agent_id = a.id
        GROUP BY a.id
        ORDER BY chunk_count DESC, a.name
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let agent_stats: Vec<AgentStats> = agent_rows
        .iter()
        .map(|row| AgentStats {
            name: row.get("name"),
            file_count: row.get("file_count"),
            chunk_count: row.get("chunk_count"),
            embedded_count: row.get("embedded_count"),
        })
        .collect();

    if !agent_stats.is_empty() {
        println!();
        println!("  Knowledge by agent:");
        println!(
            "  {:<28} {:>6} {:>8} {:>10}",
            "AGENT", "FILES", "CHUNKS", "EMBEDDED"
        );
        println!("  {}", "-".repeat(56));

        for s in &agent_stats {
            println!(
                "  {:<28} {:>6} {:>8} {:>10}",
                s.name, s.file_count, s.chunk_count, s.embedded_count
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_format_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
