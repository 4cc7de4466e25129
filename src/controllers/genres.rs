use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use validator::Validate;

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::{AuthUser, StaffUser};
use crate::models::NewGenre;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/genres", get(list_genres).post(create_genre))
}

async fn list_genres(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_genres().await?))
}

async fn create_genre(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    JsonBody(genre): JsonBody<NewGenre>,
) -> Result<impl IntoResponse, AppError> {
    let genre = NewGenre { name: genre.name.trim().to_string() };
    genre.validate()?;
    let genre = state.store.create_genre(genre).await?;
    state.cache.invalidate_plays().await;
    Ok((StatusCode::CREATED, Json(genre)))
}
