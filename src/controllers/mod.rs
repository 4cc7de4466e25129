pub mod actors;
pub mod admin;
pub mod genres;
pub mod halls;
pub mod orders;
pub mod performances;
pub mod plays;
pub mod users;

use axum::{
    extract::{FromRequest, Request},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, FieldErrors};
use crate::AppState;

pub fn routes(config: &Config) -> Router<Arc<AppState>> {
    let theatre = Router::new()
        .merge(halls::routes())
        .merge(genres::routes())
        .merge(actors::routes())
        .merge(plays::routes(config.media.max_upload_bytes))
        .merge(performances::routes())
        .merge(orders::routes());

    Router::new()
        .nest("/user", users::routes())
        .nest("/theatre", theatre)
        .nest("/admin", admin::routes())
}

/// `Json<T>` whose rejections are reported like every other 400 from this API.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::field("non_field_errors", rejection.body_text())),
        }
    }
}

/* ---------- query helpers ---------- */

/// Comma-separated id list, e.g. `genres=1,3`. Empty segments are ignored.
pub fn parse_ids(field: &str, raw: &str) -> Result<Vec<i64>, FieldErrors> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => {
                return Err(FieldErrors::single(field, format!("'{part}' is not a valid id")));
            }
        }
    }
    Ok(ids)
}

pub fn parse_number<T: std::str::FromStr>(field: &str, raw: Option<&str>) -> Result<Option<T>, FieldErrors> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| FieldErrors::single(field, format!("'{v}' is not a valid number"))),
    }
}
