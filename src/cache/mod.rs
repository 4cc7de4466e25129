use crate::redis_client::RedisClient;

pub mod plays;

/// Response cache. Without a Redis connection every lookup misses and every
/// write is a no-op, so callers never branch on whether caching is enabled.
#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis: Some(redis), ttl_seconds }
    }

    pub fn disabled() -> Self {
        Self { redis: None, ttl_seconds: 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }
}
