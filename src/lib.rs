//! # Copy Mode
//!
//! A multi-tenant marketing-copy generation service with retrieval-augmented
//! agents.
//!
//! Copy Mode combines three ingredients into every generation: an agent (an
//! LLM persona with a system prompt), an expert (a user's business/offer
//! profile), and a content type (the copy format to produce). Users chat with
//! an agent; each reply is generated by Groq, optionally grounded in
//! knowledge documents uploaded for that agent and retrieved by embedding
//! similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Knowledge  │──▶│  Pipeline    │──▶│  SQLite   │
//! │  PDF/DOCX   │   │ Chunk+Embed │   │  + BLOBs  │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   HTTP   │       │   CLI    │
//!                 │  (axum)  │       │(copymode)│
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! copymode init                 # create database + storage directories
//! copymode create-admin --email admin@example.com --password changeme123
//! copymode serve                # start the JSON API
//! copymode stats                # inspect accounts and knowledge coverage
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`auth`] | Password hashing, JWT sessions, request extractors |
//! | [`extract`] | Text extraction from PDF/DOCX/text uploads |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | OpenAI embeddings client and vector helpers |
//! | [`ingest`] | Knowledge upload pipeline |
//! | [`retrieval`] | Cosine-similarity search over knowledge chunks |
//! | [`prompt`] | System prompt and message assembly |
//! | [`completion`] | Groq chat completion client |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod auth;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod routes_agents;
pub mod routes_auth;
pub mod routes_chats;
pub mod routes_content_types;
pub mod routes_experts;
pub mod routes_knowledge;
pub mod routes_uploads;
pub mod server;
pub mod stats;
pub mod storage;
pub mod users;
