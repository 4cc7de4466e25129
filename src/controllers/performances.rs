use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{parse_number, JsonBody};
use crate::error::{AppError, FieldErrors};
use crate::middleware::{AuthUser, StaffUser};
use crate::models::performance::PerformanceDetailResponse;
use crate::models::{Performance, PerformanceFilter, PerformanceWrite};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/performances", get(list_performances).post(create_performance))
        .route(
            "/performances/{id}",
            get(get_performance).put(update_performance).delete(delete_performance),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct PerformancesQuery {
    pub date: Option<String>,
    pub movie: Option<String>,
    pub play: Option<String>,
}

impl PerformancesQuery {
    pub fn into_filter(self) -> Result<PerformanceFilter, FieldErrors> {
        let mut errors = FieldErrors::new();

        let date = match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("date", format!("'{raw}' is not a valid date, use YYYY-MM-DD"));
                    None
                }
            },
        };

        // `movie` wins when both are given
        let (field, raw) = match (self.movie, self.play) {
            (Some(movie), _) => ("movie", Some(movie)),
            (None, play) => ("play", play),
        };
        let play_id = parse_number::<i64>(field, raw.as_deref()).unwrap_or_else(|e| {
            errors.merge(e);
            None
        });

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(PerformanceFilter { date, play_id })
    }
}

#[derive(Debug, Serialize)]
struct PerformanceResponse {
    id: i64,
    show_time: NaiveDateTime,
    play: i64,
    theatre_hall: i64,
}

impl From<Performance> for PerformanceResponse {
    fn from(p: Performance) -> Self {
        Self { id: p.id, show_time: p.show_time, play: p.play_id, theatre_hall: p.theatre_hall_id }
    }
}

async fn list_performances(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(params): Query<PerformancesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = params.into_filter().map_err(AppError::Validation)?;
    Ok(Json(state.store.list_performances(&filter).await?))
}

async fn create_performance(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    JsonBody(performance): JsonBody<PerformanceWrite>,
) -> Result<impl IntoResponse, AppError> {
    performance.validate()?;
    let performance = state.store.create_performance(performance).await?;
    info!("Scheduled performance {} at {}", performance.id, performance.show_time);
    Ok((StatusCode::CREATED, Json(PerformanceResponse::from(performance))))
}

async fn get_performance(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.store.get_performance(id).await?;
    Ok(Json(PerformanceDetailResponse::from(detail)))
}

async fn update_performance(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<i64>,
    JsonBody(performance): JsonBody<PerformanceWrite>,
) -> Result<impl IntoResponse, AppError> {
    performance.validate()?;
    let performance = state.store.update_performance(id, performance).await?;
    Ok(Json(PerformanceResponse::from(performance)))
}

async fn delete_performance(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.store.delete_performance(id).await?;
    info!("Deleted performance {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_and_movie_alias() {
        let query = PerformancesQuery {
            date: Some("2024-01-03".into()),
            movie: None,
            play: Some("4".into()),
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(filter.play_id, Some(4));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let query = PerformancesQuery {
            date: Some("03/01/2024".into()),
            movie: Some("abc".into()),
            play: None,
        };
        let errors = query.into_filter().unwrap_err();
        assert!(errors.get("date").is_some());
        assert!(errors.get("movie").is_some());
    }
}
