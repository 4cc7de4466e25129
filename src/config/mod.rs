use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Top-level configuration, grouped per concern
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

// `url == None` selects the in-memory store
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

// `url == None` disables the response cache
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub max_upload_bytes: usize,
}

// Staff account created at startup when both fields are present
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Flat view of the environment. Keys are the lowercased variable names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    host: String,
    port: u16,
    environment: String,
    rust_log: String,
    log_format: String,
    database_url: String,
    db_pool_size: u32,
    redis_url: String,
    cache_ttl_seconds: u64,
    jwt_secret: String,
    jwt_expires_in_hours: i64,
    bcrypt_cost: u32,
    media_root: String,
    max_upload_bytes: usize,
    admin_email: String,
    admin_password: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
            rust_log: "theatre_api=debug,tower_http=debug".to_string(),
            log_format: "pretty".to_string(),
            database_url: String::new(),
            db_pool_size: 20,
            redis_url: String::new(),
            cache_ttl_seconds: 3600,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expires_in_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            media_root: "media".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            admin_email: String::new(),
            admin_password: String::new(),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let log_format = if raw.log_format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };

        Config {
            app: AppConfig {
                host: raw.host,
                port: raw.port,
                environment: raw.environment,
                rust_log: raw.rust_log,
                log_format,
            },
            database: DatabaseConfig {
                url: non_empty(raw.database_url),
                pool_size: raw.db_pool_size.max(1),
            },
            redis: RedisConfig {
                url: non_empty(raw.redis_url),
                ttl_seconds: raw.cache_ttl_seconds,
            },
            jwt: JwtConfig {
                secret: raw.jwt_secret,
                expires_in_hours: raw.jwt_expires_in_hours,
            },
            auth: AuthConfig {
                bcrypt_cost: raw.bcrypt_cost,
            },
            media: MediaConfig {
                root: PathBuf::from(raw.media_root),
                max_upload_bytes: raw.max_upload_bytes,
            },
            admin: AdminConfig {
                email: non_empty(raw.admin_email),
                password: non_empty(raw.admin_password),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from(RawConfig::default())
    }
}

impl Config {
    /// Serialized defaults first, environment variables on top.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let raw: RawConfig = config::Config::builder()
            .add_source(config::Config::try_from(&RawConfig::default())?)
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(Config::from(raw))
    }

    pub fn is_production(&self) -> bool {
        self.app.environment.eq_ignore_ascii_case("production")
    }
}
