//! HTTP API server.
//!
//! Exposes the whole product surface as a JSON API: accounts and sessions,
//! agent/expert/content-type CRUD, chats with copy generation, and the
//! knowledge pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`    | `/health` | — | Health check (returns version) |
//! | `POST`   | `/auth/register` | — | Create an account, returns a token |
//! | `POST`   | `/auth/login` | — | Exchange credentials for a token |
//! | `GET`    | `/auth/me` | user | Current user profile |
//! | `GET`    | `/agents` | user | List agents |
//! | `POST`   | `/agents` | admin | Create an agent |
//! | `GET`    | `/agents/{id}` | user | Fetch one agent |
//! | `PUT`    | `/agents/{id}` | admin | Update an agent |
//! | `DELETE` | `/agents/{id}` | admin | Delete an agent |
//! | `GET`    | `/agents/{id}/knowledge` | user | List knowledge files |
//! | `POST`   | `/agents/{id}/knowledge` | admin | Upload + ingest a file |
//! | `DELETE` | `/agents/{id}/knowledge/{file_id}` | admin | Delete one file |
//! | `POST`   | `/agents/{id}/knowledge/purge` | admin | Drop all knowledge |
//! | `POST`   | `/agents/{id}/knowledge/search` | user | Semantic search |
//! | `GET`/`POST` | `/experts` | user | List / create experts |
//! | `GET`/`PUT`/`DELETE` | `/experts/{id}` | user | Expert CRUD |
//! | `GET`/`POST` | `/content-types` | user | List / create content types |
//! | `GET`/`PUT`/`DELETE` | `/content-types/{id}` | user | Content type CRUD |
//! | `GET`/`POST` | `/chats` | user | List / create chats |
//! | `GET`/`PATCH`/`DELETE` | `/chats/{id}` | user | Chat fetch / rename / delete |
//! | `GET`    | `/chats/{id}/messages` | user | Full transcript |
//! | `POST`   | `/chats/{id}/messages` | user | Send a message, get copy back |
//! | `POST`   | `/uploads/avatars` | user | Upload an avatar image |
//! | `GET`    | `/uploads/avatars/{name}` | — | Serve a stored avatar |
//!
//! # Error Contract
//!
//! Every error response is:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "email must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `unauthorized` (401), `forbidden` (403),
//! `not_found` (404), `conflict` (409), `payload_too_large` (413),
//! `embeddings_disabled` (400), `completion_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! talk to the API directly.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::storage;
use crate::{
    routes_agents, routes_auth, routes_chats, routes_content_types, routes_experts,
    routes_knowledge, routes_uploads,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: sqlx::SqlitePool,
    pub jwt_secret: String,
}

/// Starts the API server.
///
/// Requires `COPYMODE_JWT_SECRET` in the environment for token signing.
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let jwt_secret = std::env::var("COPYMODE_JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("COPYMODE_JWT_SECRET environment variable not set"))?;

    storage::ensure_dirs(&config.storage)?;
    let pool = db::connect(config).await?;
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        jwt_secret,
    };

    let app = build_router(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the full router. Separate from [`run_server`] so tests can mount
/// the app on an ephemeral port.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/auth/register", post(routes_auth::register))
        .route("/auth/login", post(routes_auth::login))
        .route("/auth/me", get(routes_auth::me))
        .route(
            "/agents",
            get(routes_agents::list).post(routes_agents::create),
        )
        .route(
            "/agents/{id}",
            get(routes_agents::get_one)
                .put(routes_agents::update)
                .delete(routes_agents::remove),
        )
        .route(
            "/agents/{id}/knowledge",
            get(routes_knowledge::list).post(routes_knowledge::upload),
        )
        .route(
            "/agents/{id}/knowledge/search",
            post(routes_knowledge::search),
        )
        .route(
            "/agents/{id}/knowledge/purge",
            post(routes_knowledge::purge),
        )
        .route(
            "/agents/{id}/knowledge/{file_id}",
            delete(routes_knowledge::remove),
        )
        .route(
            "/experts",
            get(routes_experts::list).post(routes_experts::create),
        )
        .route(
            "/experts/{id}",
            get(routes_experts::get_one)
                .put(routes_experts::update)
                .delete(routes_experts::remove),
        )
        .route(
            "/content-types",
            get(routes_content_types::list).post(routes_content_types::create),
        )
        .route(
            "/content-types/{id}",
            get(routes_content_types::get_one)
                .put(routes_content_types::update)
                .delete(routes_content_types::remove),
        )
        .route("/chats", get(routes_chats::list).post(routes_chats::create))
        .route(
            "/chats/{id}",
            get(routes_chats::get_one)
                .patch(routes_chats::rename)
                .delete(routes_chats::remove),
        )
        .route(
            "/chats/{id}/messages",
            get(routes_chats::list_messages).post(routes_chats::send_message),
        )
        .route("/uploads/avatars", post(routes_uploads::upload_avatar))
        .route("/uploads/avatars/{name}", get(routes_uploads::get_avatar))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
