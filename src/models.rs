//! Core data models used throughout Copy Mode.
//!
//! These types mirror the SQLite rows for users, agents, profiles, chats, and
//! the knowledge pipeline, plus the scored chunks the retriever returns.

use serde::Serialize;

/// Account row. Never serialized directly; API responses use [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: i64,
}

/// The public view of a user, safe to return from the API.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: i64,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

/// An LLM persona shared across all tenants. Admin-managed.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub description: String,
    pub temperature: Option<f64>,
    pub avatar_path: Option<String>,
    pub created_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A business/offer profile owned by one user.
#[derive(Debug, Clone, Serialize)]
pub struct Expert {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub niche: String,
    pub target_audience: String,
    pub deliverables: String,
    pub benefits: String,
    pub objections: String,
    pub avatar_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A copy format description owned by one user.
#[derive(Debug, Clone, Serialize)]
pub struct ContentType {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub avatar_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A conversation. Profile references go NULL when the referenced row is
/// deleted; the transcript itself survives.
#[derive(Debug, Clone, Serialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub agent_id: Option<String>,
    pub expert_id: Option<String>,
    pub content_type_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One turn in a chat transcript. `role` is `user` or `assistant`.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: String,
    pub content: String,
    pub created_at: i64,
}

/// Metadata for an uploaded knowledge file. The on-disk path stays internal.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeFile {
    pub id: String,
    pub agent_id: String,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<String>,
    pub created_at: i64,
}

/// A chunk scored against a query embedding.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub file_id: String,
    pub file_name: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}
