//! # Copy Mode CLI (`copymode`)
//!
//! The `copymode` binary drives the service: database initialization, admin
//! account creation, the HTTP API server, and a database statistics overview.
//!
//! ## Usage
//!
//! ```bash
//! copymode --config ./config/copymode.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `copymode init` | Create the SQLite database and run schema migrations |
//! | `copymode create-admin` | Create an administrator account |
//! | `copymode serve` | Start the JSON API server |
//! | `copymode stats` | Print account and knowledge coverage statistics |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database and storage directories
//! copymode init --config ./config/copymode.toml
//!
//! # Create the first admin
//! copymode create-admin --email admin@example.com --password changeme123
//!
//! # Start the API (requires COPYMODE_JWT_SECRET)
//! COPYMODE_JWT_SECRET=dev-secret copymode serve --config ./config/copymode.toml
//!
//! # Check ingestion and embedding coverage
//! copymode stats --config ./config/copymode.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use copymode::users::CreateUserError;
use copymode::{config, db, migrate, server, stats, storage, users};

/// Copy Mode CLI — a multi-tenant marketing-copy generation service with
/// retrieval-augmented agents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/copymode.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "copymode",
    about = "Copy Mode — a multi-tenant marketing-copy generation service with retrieval-augmented agents",
    version,
    long_about = "Copy Mode generates marketing copy by combining an agent (an LLM persona), \
    an expert (a business/offer profile), and a content type (the copy format). Replies come \
    from Groq and can be grounded in knowledge documents uploaded per agent and retrieved by \
    embedding similarity."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/copymode.toml`. All database, storage, chunking,
    /// embedding, and completion settings are read from this file.
    #[arg(long, global = true, default_value = "./config/copymode.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and storage directories.
    ///
    /// Creates the SQLite database file and all required tables (users,
    /// agents, experts, content_types, chats, messages, knowledge_files,
    /// knowledge_chunks). Running it on an existing database is safe.
    Init,

    /// Create an administrator account.
    ///
    /// Admins manage the global agent roster and its knowledge. The email is
    /// normalized to lowercase; the password must be at least 8 characters.
    CreateAdmin {
        /// Email address for the new admin.
        #[arg(long)]
        email: String,

        /// Password (minimum 8 characters).
        #[arg(long)]
        password: String,

        /// Display name. Defaults to the email's local part.
        #[arg(long)]
        name: Option<String>,
    },

    /// Start the JSON API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// Copy Mode API. Requires the `COPYMODE_JWT_SECRET` environment variable
    /// for session token signing.
    Serve,

    /// Print database statistics.
    ///
    /// Shows account, profile, and chat counts plus per-agent knowledge and
    /// embedding coverage.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("copymode=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            storage::ensure_dirs(&cfg.storage)?;
            println!("Database initialized successfully.");
        }
        Commands::CreateAdmin {
            email,
            password,
            name,
        } => {
            create_admin(&cfg, &email, &password, name.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

async fn create_admin(
    cfg: &config::Config,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        anyhow::bail!("a valid email is required");
    }
    if password.len() < 8 {
        anyhow::bail!("password must be at least 8 characters");
    }
    let display_name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or("admin").to_string());

    let pool = db::connect(cfg).await?;
    let result = users::create_user(&pool, &email, password, &display_name, true).await;
    pool.close().await;

    match result {
        Ok(user) => {
            println!("Admin account created: {} ({})", user.email, user.id);
            Ok(())
        }
        Err(CreateUserError::EmailTaken) => {
            anyhow::bail!("an account with email {} already exists", email)
        }
        Err(CreateUserError::Other(e)) => Err(e),
    }
}
