//! Registration, login, and the current-user endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::models::UserProfile;
use crate::server::AppState;
use crate::users::{self, CreateUserError};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserProfile,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("a valid email is required"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }

    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or("user"))
        .to_string();

    let user = users::create_user(&state.pool, &email, &req.password, &display_name, false)
        .await
        .map_err(|e| match e {
            CreateUserError::EmailTaken => ApiError::conflict("email already registered"),
            CreateUserError::Other(e) => e.into(),
        })?;

    let token = auth::issue_token(&user, &state.jwt_secret, state.config.auth.token_ttl_hours as i64)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok(Json(SessionResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let email = req.email.trim().to_lowercase();
    let user = users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid email or password"))?;

    if !auth::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::unauthorized("invalid email or password"));
    }

    let token = auth::issue_token(&user, &state.jwt_secret, state.config.auth.token_ttl_hours as i64)?;

    Ok(Json(SessionResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<UserProfile>> {
    let user = users::find_by_id(&state.pool, &user.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("account no longer exists"))?;
    Ok(Json(UserProfile::from(&user)))
}
