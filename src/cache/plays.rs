use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::CacheService;
use crate::models::PlayFilter;

const PLAY_LIST_PREFIX: &str = "plays:list:";
/// Bumped on every invalidation; list entries are keyed under the current value,
/// so older entries become unreachable and age out with their TTL.
const PLAY_LIST_GENERATION: &str = "plays:list:generation";

pub fn play_list_key(generation: u64, filter: &PlayFilter) -> String {
    let digest = Sha256::digest(filter.canonical().as_bytes());
    format!("{PLAY_LIST_PREFIX}{generation}:{digest:x}")
}

#[derive(Debug, PartialEq, Eq)]
pub enum PlayListLookup {
    Hit(String),
    /// Generation to hand back to `put_play_list`. `None` when there is nothing to write to.
    Miss(Option<u64>),
}

impl CacheService {
    /// Serialized play-list response for this filter, if cached.
    ///
    /// Read the lookup before querying the store: a list written back under a
    /// generation that was invalidated in the meantime is never served.
    pub async fn get_play_list(&self, filter: &PlayFilter) -> PlayListLookup {
        let Some(redis) = self.redis.as_ref() else { return PlayListLookup::Miss(None) };
        let mut conn = redis.conn.clone();

        let generation = match conn.get::<_, Option<u64>>(PLAY_LIST_GENERATION).await {
            Ok(generation) => generation.unwrap_or(0),
            Err(e) => {
                warn!("play list generation read failed: {:?}", e);
                return PlayListLookup::Miss(None);
            }
        };

        match conn.get::<_, Option<String>>(play_list_key(generation, filter)).await {
            Ok(Some(hit)) => PlayListLookup::Hit(hit),
            Ok(None) => PlayListLookup::Miss(Some(generation)),
            Err(e) => {
                warn!("play list cache read failed: {:?}", e);
                PlayListLookup::Miss(None)
            }
        }
    }

    pub async fn put_play_list(&self, generation: u64, filter: &PlayFilter, json: &str) {
        let Some(redis) = self.redis.as_ref() else { return };
        let mut conn = redis.conn.clone();
        let res: Result<(), _> = conn
            .set_ex(play_list_key(generation, filter), json, self.ttl_seconds)
            .await;
        if let Err(e) = res {
            warn!("play list cache write failed: {:?}", e);
        }
    }

    /// Drops every cached play list. Called after any change to plays, genres or actors.
    pub async fn invalidate_plays(&self) {
        let Some(redis) = self.redis.as_ref() else {
            debug!("cache disabled, nothing to invalidate");
            return;
        };
        let mut conn = redis.conn.clone();

        let res: redis::RedisResult<u64> = conn.incr(PLAY_LIST_GENERATION, 1).await;
        match res {
            Ok(generation) => info!("Play list cache moved to generation {}", generation),
            Err(e) => warn!("play list invalidation failed: {:?}", e),
        }
    }
}
