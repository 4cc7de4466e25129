//! Staff-only maintenance routes. Every delete cascades through dependent rows.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

use super::orders::{order_page, PageQuery};
use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(all_orders))
        .route("/tickets", get(all_tickets))
        .route("/plays/{id}", delete(delete_play))
        .route("/performances/{id}", delete(delete_performance))
        .route("/theatre_halls/{id}", delete(delete_hall))
        .route("/genres/{id}", delete(delete_genre))
        .route("/actors/{id}", delete(delete_actor))
        .route("/orders/{id}", delete(delete_order))
}

async fn all_orders(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.into_page()?;
    Ok(Json(order_page(&state, None, page).await?))
}

async fn all_tickets(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_tickets().await?))
}

async fn delete_play(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_play(id).await?;
    state.cache.invalidate_plays().await;
    info!("Staff {} deleted play {}", staff.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_performance(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_performance(id).await?;
    info!("Staff {} deleted performance {}", staff.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_hall(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_hall(id).await?;
    info!("Staff {} deleted theatre hall {}", staff.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_genre(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_genre(id).await?;
    state.cache.invalidate_plays().await;
    info!("Staff {} deleted genre {}", staff.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_actor(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_actor(id).await?;
    state.cache.invalidate_plays().await;
    info!("Staff {} deleted actor {}", staff.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_order(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_order(id).await?;
    info!("Staff {} deleted order {}", staff.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}
