use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use validator::Validate;

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::{AuthUser, StaffUser};
use crate::models::hall::TheatreHallResponse;
use crate::models::NewTheatreHall;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/theatre_halls", get(list_halls).post(create_hall))
}

async fn list_halls(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let halls = state.store.list_halls().await?;
    Ok(Json(halls.into_iter().map(TheatreHallResponse::from).collect::<Vec<_>>()))
}

async fn create_hall(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    JsonBody(hall): JsonBody<NewTheatreHall>,
) -> Result<impl IntoResponse, AppError> {
    hall.validate()?;
    let hall = state.store.create_hall(hall).await?;
    Ok((StatusCode::CREATED, Json(TheatreHallResponse::from(hall))))
}
