use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::debug;

use crate::error::AppError;
use crate::models::User;
use crate::services::auth;
use crate::AppState;

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub is_staff: bool,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self { user_id: user.id, email: user.email, is_staff: user.is_staff }
    }
}

/// Authenticated staff caller. Anonymous callers get 403 here, not 401.
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthUser);

enum Scheme<'a> {
    Bearer(&'a str),
    Basic(&'a str),
}

fn scheme(parts: &Parts) -> Option<Scheme<'_>> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    if let Some(token) = value.strip_prefix("Bearer ") {
        Some(Scheme::Bearer(token.trim()))
    } else {
        value.strip_prefix("Basic ").map(|encoded| Scheme::Basic(encoded.trim()))
    }
}

async fn basic_user(state: &AppState, encoded: &str) -> Result<AuthUser, AppError> {
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AppError::Unauthorized)?;
    let credentials = String::from_utf8(decoded).map_err(|_| AppError::Unauthorized)?;

    // email:password
    let (email, password) = credentials.split_once(':').ok_or(AppError::Unauthorized)?;

    let user = auth::authenticate(state.store.as_ref(), email, password)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(user.into())
}

async fn bearer_user(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = auth::decode_token(token, &state.config.jwt).ok_or(AppError::Unauthorized)?;

    // Tokens outlive accounts; the stored user is the source of truth for the staff flag.
    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(user.into())
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let result = match scheme(parts) {
            Some(Scheme::Bearer(token)) => bearer_user(state, token).await,
            Some(Scheme::Basic(encoded)) => basic_user(state, encoded).await,
            None => Err(AppError::Unauthorized),
        };

        if let Err(AppError::Unauthorized) = &result {
            debug!("rejected credentials for {} {}", parts.method, parts.uri.path());
        }
        result
    }
}

impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => user,
            Err(AppError::Unauthorized) => return Err(AppError::Forbidden),
            Err(e) => return Err(e),
        };

        if !user.is_staff {
            return Err(AppError::Forbidden);
        }
        Ok(StaffUser(user))
    }
}
