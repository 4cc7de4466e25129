use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use theatre_api::{
    app,
    cache::CacheService,
    config::{Config, LogFormat},
    database::Database,
    redis_client::RedisClient,
    services::auth,
    storage::{MemoryStore, TheatreStore},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.app.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    info!("Starting Theatre API ({})", config.app.environment);

    // Postgres when configured, otherwise everything lives in process memory
    let store: Arc<dyn TheatreStore> = match &config.database.url {
        Some(url) => {
            let db = Database::new(url, config.database.pool_size)
                .await
                .context("Failed to connect to database")?;
            info!("Database connected");
            db.run_migrations().await.context("Failed to run migrations")?;
            Arc::new(db)
        }
        None => {
            if config.is_production() {
                warn!("DATABASE_URL is empty in production; data will not survive a restart");
            } else {
                warn!("DATABASE_URL is empty, using the in-memory store");
            }
            Arc::new(MemoryStore::new())
        }
    };

    let cache = match &config.redis.url {
        Some(url) => {
            let redis = RedisClient::new(url).await.context("Failed to connect to Redis")?;
            info!("Redis connected");
            CacheService::new(redis, config.redis.ttl_seconds)
        }
        None => {
            info!("REDIS_URL is empty, response cache disabled");
            CacheService::disabled()
        }
    };

    auth::ensure_admin(store.as_ref(), &config.admin, config.auth.bcrypt_cost)
        .await
        .context("Failed to create staff account")?;

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("Invalid HOST/PORT")?;

    let state = AppState::new(store, cache, config);
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
