//! Short-lived identity-verification cache.
//!
//! Keyed by the raw bearer token purely to avoid redundant verification
//! round-trips. Never a correctness dependency: a miss just re-verifies.
//! Backed by redis when REDIS_URL is set, otherwise an in-process map.

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use redis::AsyncCommands;
use std::time::{Duration, Instant};

pub const IDENTITY_TTL: Duration = Duration::from_secs(60);

enum Backend {
    Redis(redis::Client),
    Local(DashMap<String, (String, Instant)>),
}

pub struct IdentityCache {
    backend: Backend,
}

static IDENTITY_CACHE: OnceCell<IdentityCache> = OnceCell::new();

#[inline(always)]
pub fn get_identity_cache() -> &'static IdentityCache {
    unsafe { IDENTITY_CACHE.get_unchecked() }
}

pub fn init() {
    let backend = match std::env::var("REDIS_URL") {
        Ok(url) => Backend::Redis(
            redis::Client::open(url).expect("REDIS_URL is not a valid redis url"),
        ),
        Err(_) => Backend::Local(DashMap::new()),
    };
    if IDENTITY_CACHE.set(IdentityCache { backend }).is_err() {
        panic!("failed to set IDENTITY_CACHE");
    }
}

fn cache_key(token: &str) -> String {
    format!("gffft:idtok:{}", token)
}

impl IdentityCache {
    #[cfg(test)]
    pub fn local() -> Self {
        Self {
            backend: Backend::Local(DashMap::new()),
        }
    }

    pub async fn get(&self, token: &str) -> Option<String> {
        match &self.backend {
            Backend::Redis(client) => {
                let mut con = client.get_async_connection().await.ok()?;
                con.get::<_, Option<String>>(cache_key(token)).await.ok()?
            }
            Backend::Local(map) => {
                if let Some(hit) = map.get(token) {
                    if hit.1.elapsed() < IDENTITY_TTL {
                        return Some(hit.0.to_owned());
                    }
                }
                // Expired entries are evicted lazily.
                map.remove(token);
                None
            }
        }
    }

    pub async fn put(&self, token: &str, uid: &str) {
        match &self.backend {
            Backend::Redis(client) => {
                if let Ok(mut con) = client.get_async_connection().await {
                    let res: Result<(), _> = con
                        .set_ex(cache_key(token), uid, IDENTITY_TTL.as_secs() as usize)
                        .await;
                    if let Err(e) = res {
                        log::warn!("identity cache write failed: {}", e);
                    }
                }
            }
            Backend::Local(map) => {
                map.insert(token.to_owned(), (uid.to_owned(), Instant::now()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_local_round_trip() {
        let cache = IdentityCache::local();
        assert_eq!(cache.get("tok").await, None);
        cache.put("tok", "user-1").await;
        assert_eq!(cache.get("tok").await, Some("user-1".to_owned()));
        assert_eq!(cache.get("other").await, None);
    }
}
