use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_number, JsonBody};
use crate::error::{AppError, FieldErrors};
use crate::middleware::AuthUser;
use crate::models::{OrderPage, Page};
use crate::services::booking::{self, OrderRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/orders", get(list_orders).post(create_order))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageQuery {
    pub fn into_page(self) -> Result<Page, AppError> {
        let mut errors = FieldErrors::new();
        let number = parse_number::<u32>("page", self.page.as_deref()).unwrap_or_else(|e| {
            errors.merge(e);
            None
        });
        let size = parse_number::<u32>("page_size", self.page_size.as_deref()).unwrap_or_else(|e| {
            errors.merge(e);
            None
        });
        errors.into_result()?;
        Ok(Page::new(number, size))
    }
}

pub async fn order_page(state: &AppState, user_id: Option<i64>, page: Page) -> Result<OrderPage, AppError> {
    let (count, results) = state.store.list_orders(user_id, page).await?;
    Ok(OrderPage { count, page: page.number, page_size: page.size, results })
}

// GET /api/theatre/orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.into_page()?;
    Ok(Json(order_page(&state, Some(user.user_id), page).await?))
}

// POST /api/theatre/orders
async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(request): JsonBody<OrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = booking::place_order(state.store.as_ref(), user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
