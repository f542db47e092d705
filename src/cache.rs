use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

/// Keys for the two read-through caches.
///
/// Listing keys go through the short-TTL cache; everything else through the
/// long-TTL cache. Region-scoped lookups carry the region in the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Listing(String),
    Certification { region: String, id: u64 },
    TvRating { region: String, id: u64 },
    Providers { kind: String, region: String, id: u64 },
    Person(String),
    Keyword(String),
    Similar { kind: String, id: u64 },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Listing(query) => write!(f, "list:{}", query.to_lowercase()),
            CacheKey::Certification { region, id } => write!(f, "cert:{}:{}", region, id),
            CacheKey::TvRating { region, id } => write!(f, "tvrate:{}:{}", region, id),
            CacheKey::Providers { kind, region, id } => {
                write!(f, "prov:{}:{}:{}", kind, region, id)
            }
            CacheKey::Person(name) => write!(f, "person:{}", name.to_lowercase()),
            CacheKey::Keyword(word) => write!(f, "kw:{}", word.to_lowercase()),
            CacheKey::Similar { kind, id } => write!(f, "similar:{}:{}", kind, id),
        }
    }
}

/// Clock abstraction so cache expiry is testable with a fake clock
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-process cache with per-entry TTL and lazy expiry on read.
///
/// Values are stored serialized so the cache owns no domain types. There is
/// no eviction beyond lazy expiry and no size bound; the working set is
/// small enough that unbounded growth is an accepted limitation.
#[derive(Clone)]
pub struct TtlCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self::with_clock(ttl_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs),
            clock,
        }
    }

    /// Retrieves a value from the cache by key
    ///
    /// Expired entries are removed on read and reported as a miss.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let key = format!("{}", key);
        let now = self.clock.now();

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if entry.expires_at > now => {
                    let data = serde_json::from_str(&entry.value).map_err(|e| {
                        AppError::Internal(format!("Cache deserialization error: {}", e))
                    })?;
                    return Ok(Some(data));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Entry exists but is stale; drop it under the write lock
        self.entries.write().await.remove(&key);
        Ok(None)
    }

    /// Stores a value in the cache under the instance-wide TTL
    pub async fn set<T: serde::Serialize>(&self, key: &CacheKey, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let entry = CacheEntry {
            value: json,
            expires_at: self.clock.now() + self.ttl,
        };

        self.entries.write().await.insert(format!("{}", key), entry);
    }
}

/// Get-or-compute-and-store against a [`TtlCache`].
///
/// If the key is present and fresh, the cached value is returned. Otherwise
/// the block is awaited, its value stored, and returned.
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $block:expr) => {{
        if let Some(cached) = $cache.get(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set(&$key, &value).await;
            Ok(value)
        }
    }};
}
