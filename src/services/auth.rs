//! auth.rs
//!
//! Credential handling for the API.
//!
//! - Password hashing and verification with bcrypt. Both run on the blocking pool,
//!   bcrypt is deliberately slow.
//! - HS256 access tokens carrying the user id and staff flag.
//! - Registration and the optional staff bootstrap account.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AdminConfig, JwtConfig};
use crate::error::AppError;
use crate::models::user::Credentials;
use crate::models::{NewUser, User};
use crate::storage::TheatreStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub is_staff: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))
}

pub fn issue_token(user: &User, jwt: &JwtConfig) -> Result<TokenResponse, AppError> {
    let now = Utc::now().timestamp();
    let expires_in = jwt.expires_in_hours * 3600;
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        is_staff: user.is_staff,
        iat: now,
        exp: now + expires_in,
    };

    let access = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))?;

    Ok(TokenResponse { access, token_type: "Bearer", expires_in })
}

/// Any decoding failure (bad signature, expired, malformed) is reported as `None`.
pub fn decode_token(token: &str, jwt: &JwtConfig) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .ok()
    .map(|data| data.claims)
}

pub async fn register(
    store: &dyn TheatreStore,
    credentials: Credentials,
    is_staff: bool,
    cost: u32,
) -> Result<User, AppError> {
    let email = normalize_email(&credentials.email);
    let password_hash = hash_password(credentials.password, cost).await?;
    let user = store.create_user(NewUser { email, password_hash, is_staff }).await?;
    info!("Registered user {} (staff: {})", user.id, user.is_staff);
    Ok(user)
}

/// Looks the user up by email and checks the password.
pub async fn authenticate(
    store: &dyn TheatreStore,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let Some(user) = store.find_user_by_email(&normalize_email(email)).await? else {
        return Ok(None);
    };
    if verify_password(password.to_string(), user.password_hash.clone()).await? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Creates the configured staff account. An existing user with that email keeps
/// their password but is given staff rights.
pub async fn ensure_admin(store: &dyn TheatreStore, admin: &AdminConfig, cost: u32) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&admin.email, &admin.password) else {
        return Ok(());
    };

    match store.find_user_by_email(&normalize_email(email)).await? {
        Some(user) if user.is_staff => {
            info!("Staff account {} already present", user.email);
        }
        Some(user) => {
            let user = store.set_user_staff(user.id, true).await?;
            warn!("Existing user {} promoted to staff", user.email);
        }
        None => {
            let credentials = Credentials { email: email.clone(), password: password.clone() };
            let user = register(store, credentials, true, cost).await?;
            info!("Created staff account {}", user.email);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn jwt() -> JwtConfig {
        JwtConfig { secret: "test-secret".into(), expires_in_hours: 1 }
    }

    fn user(is_staff: bool) -> User {
        User {
            id: 42,
            email: "staff@theatre.test".into(),
            password_hash: String::new(),
            is_staff,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip_keeps_claims() {
        let token = issue_token(&user(true), &jwt()).unwrap();
        let claims = decode_token(&token.access, &jwt()).unwrap();
        assert_eq!(claims.sub, 42);
        assert!(claims.is_staff);
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(&user(false), &jwt()).unwrap();
        let other = JwtConfig { secret: "other".into(), expires_in_hours: 1 };
        assert!(decode_token(&token.access, &other).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = JwtConfig { secret: "test-secret".into(), expires_in_hours: -2 };
        let token = issue_token(&user(false), &expired).unwrap();
        assert!(decode_token(&token.access, &jwt()).is_none());
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let store = MemoryStore::new();
        let credentials = Credentials { email: " Test@Test.com ".into(), password: "Test12345".into() };
        let created = register(&store, credentials, false, 4).await.unwrap();
        assert_eq!(created.email, "test@test.com");

        let found = authenticate(&store, "TEST@test.com", "Test12345").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
        assert!(authenticate(&store, "test@test.com", "wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let store = MemoryStore::new();
        let admin = AdminConfig { email: Some("admin@admin.com".into()), password: Some("Test12345".into()) };
        ensure_admin(&store, &admin, 4).await.unwrap();
        ensure_admin(&store, &admin, 4).await.unwrap();
        let user = store.find_user_by_email("admin@admin.com").await.unwrap().unwrap();
        assert!(user.is_staff);
    }

    #[tokio::test]
    async fn ensure_admin_promotes_existing_customer() {
        let store = MemoryStore::new();
        let customer = Credentials { email: "Admin@Admin.com".into(), password: "Customer1".into() };
        let existing = register(&store, customer, false, 4).await.unwrap();
        assert!(!existing.is_staff);

        let admin = AdminConfig { email: Some("admin@admin.com".into()), password: Some("Test12345".into()) };
        ensure_admin(&store, &admin, 4).await.unwrap();

        let user = store.find_user_by_email("admin@admin.com").await.unwrap().unwrap();
        assert_eq!(user.id, existing.id);
        assert!(user.is_staff);
        assert!(authenticate(&store, "admin@admin.com", "Customer1").await.unwrap().is_some());
    }
}
