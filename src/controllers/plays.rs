use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

use super::{parse_ids, JsonBody};
use crate::cache::plays::PlayListLookup;
use crate::error::{AppError, FieldErrors};
use crate::middleware::{AuthUser, StaffUser};
use crate::models::play::{PlayDetailResponse, PlayListItem};
use crate::models::{PlayFilter, PlayWrite};
use crate::services::uploads;
use crate::AppState;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/plays", get(list_plays).post(create_play))
        .route("/plays/{id}", get(get_play).put(update_play))
        .route(
            "/plays/{id}/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaysQuery {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub actors: Option<String>,
}

impl PlaysQuery {
    pub fn into_filter(self) -> Result<PlayFilter, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut ids = |field: &str, raw: Option<String>| match raw {
            None => None,
            Some(raw) => match parse_ids(field, &raw) {
                Ok(ids) => Some(ids),
                Err(e) => {
                    errors.merge(e);
                    None
                }
            },
        };
        let genres = ids("genres", self.genres);
        let actors = ids("actors", self.actors);

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(PlayFilter {
            title: self.title.filter(|t| !t.trim().is_empty()),
            genres,
            actors,
        })
    }
}

// GET /api/theatre/plays
async fn list_plays(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(params): Query<PlaysQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = params.into_filter().map_err(AppError::Validation)?;

    let generation = match state.cache.get_play_list(&filter).await {
        PlayListLookup::Hit(cached) => {
            debug!("play list cache hit");
            return Ok(([(header::CONTENT_TYPE, "application/json"), (X_CACHE, "HIT")], cached));
        }
        PlayListLookup::Miss(generation) => generation,
    };

    let plays: Vec<PlayListItem> = state
        .store
        .list_plays(&filter)
        .await?
        .into_iter()
        .map(PlayListItem::from)
        .collect();
    let body = serde_json::to_string(&plays).map_err(|e| AppError::Internal(e.into()))?;
    if let Some(generation) = generation {
        state.cache.put_play_list(generation, &filter, &body).await;
    }

    Ok(([(header::CONTENT_TYPE, "application/json"), (X_CACHE, "MISS")], body))
}

// POST /api/theatre/plays
async fn create_play(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    JsonBody(play): JsonBody<PlayWrite>,
) -> Result<impl IntoResponse, AppError> {
    play.validate()?;
    let play = state.store.create_play(play).await?;
    state.cache.invalidate_plays().await;
    info!("Created play {} '{}'", play.play.id, play.play.title);
    Ok((StatusCode::CREATED, Json(PlayDetailResponse::from(play))))
}

// GET /api/theatre/plays/{id}
async fn get_play(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let play = state.store.get_play(id).await?;
    Ok(Json(PlayDetailResponse::from(play)))
}

// PUT /api/theatre/plays/{id}
async fn update_play(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<i64>,
    JsonBody(play): JsonBody<PlayWrite>,
) -> Result<impl IntoResponse, AppError> {
    play.validate()?;
    let play = state.store.update_play(id, play).await?;
    state.cache.invalidate_plays().await;
    Ok(Json(PlayDetailResponse::from(play)))
}

#[derive(Debug, Serialize)]
struct ImageResponse {
    id: i64,
    image: Option<String>,
}

// POST /api/theatre/plays/{id}/upload-image
async fn upload_image(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let play = state.store.get_play(id).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::field("image", e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        if !field.content_type().is_some_and(|ct| ct.starts_with("image/")) {
            return Err(AppError::field("image", "upload a valid image file"));
        }
        let filename = field.file_name().unwrap_or("image").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::field("image", e.body_text()))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(AppError::field("image", "no file was submitted"));
    };
    if bytes.is_empty() {
        return Err(AppError::field("image", "the submitted file is empty"));
    }

    let relative = uploads::play_image_path(&play.play.title, &filename);
    uploads::save_upload(&state.config.media.root, &relative, &bytes).await?;

    let play = state.store.set_play_image(id, &relative).await?;
    state.cache.invalidate_plays().await;

    Ok(Json(ImageResponse { id: play.play.id, image: play.play.image }))
}
