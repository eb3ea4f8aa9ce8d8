//! User account storage.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::auth;
use crate::models::User;

/// Why an account could not be created. `EmailTaken` is the one callers
/// branch on; everything else is opaque.
#[derive(Debug)]
pub enum CreateUserError {
    EmailTaken,
    Other(anyhow::Error),
}

impl std::fmt::Display for CreateUserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreateUserError::EmailTaken => write!(f, "email already registered"),
            CreateUserError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CreateUserError {}

/// Hash the password and insert the account row. The email must already be
/// trimmed and lowercased.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    display_name: &str,
    is_admin: bool,
) -> Result<User, CreateUserError> {
    let password_hash = auth::hash_password(password).map_err(CreateUserError::Other)?;
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash,
        display_name: display_name.to_string(),
        is_admin,
        created_at: chrono::Utc::now().timestamp(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, display_name, is_admin, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.display_name)
    .bind(user.is_admin)
    .bind(user.created_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(user),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(CreateUserError::EmailTaken)
        }
        Err(e) => Err(CreateUserError::Other(e.into())),
    }
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, password_hash, display_name, is_admin, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| user_from_row(&r)))
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, password_hash, display_name, is_admin, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| user_from_row(&r)))
}

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
    }
}
