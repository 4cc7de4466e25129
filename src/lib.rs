pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod storage;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::cache::CacheService;
use crate::config::Config;
use crate::storage::TheatreStore;

// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TheatreStore>,
    pub cache: CacheService,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn TheatreStore>, cache: CacheService, config: Config) -> Arc<Self> {
        Arc::new(Self { store, cache, config })
    }
}

/// The full HTTP surface: banner, health, `/api`, and uploaded media.
pub fn app(state: Arc<AppState>) -> Router {
    let media = ServeDir::new(&state.config.media.root);

    Router::new()
        .route("/", get(|| async { "Theatre API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes(&state.config))
        .nest_service("/media", media)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
