use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use validator::Validate;

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::{AuthUser, StaffUser};
use crate::models::actor::ActorResponse;
use crate::models::NewActor;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/actors", get(list_actors).post(create_actor))
}

async fn list_actors(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let actors = state.store.list_actors().await?;
    Ok(Json(actors.into_iter().map(ActorResponse::from).collect::<Vec<_>>()))
}

async fn create_actor(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    JsonBody(actor): JsonBody<NewActor>,
) -> Result<impl IntoResponse, AppError> {
    actor.validate()?;
    let actor = state.store.create_actor(actor).await?;
    state.cache.invalidate_plays().await;
    Ok((StatusCode::CREATED, Json(ActorResponse::from(actor))))
}
