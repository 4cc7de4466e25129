use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::user::{Credentials, UserResponse};
use crate::services::auth;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(token))
        .route("/me", get(me))
}

// POST /api/user/register
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    credentials.validate()?;
    let user = auth::register(state.store.as_ref(), credentials, false, state.config.auth.bcrypt_cost).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    email: String,
    password: String,
}

// POST /api/user/token
async fn token(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth::authenticate(state.store.as_ref(), &req.email, &req.password)
        .await?
        .ok_or_else(|| AppError::field("non_field_errors", "Unable to log in with provided credentials."))?;

    let token = auth::issue_token(&user, &state.config.jwt)?;
    info!("Issued access token for user {}", user.id);
    Ok(Json(token))
}

// GET /api/user/me
async fn me(user: AuthUser) -> Json<UserResponse> {
    Json(UserResponse { id: user.user_id, email: user.email, is_staff: user.is_staff })
}
