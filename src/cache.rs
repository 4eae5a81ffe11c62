//! # In-Memory TTL Cache
//!
//! Typed read-through cache used to avoid redundant management-layer reads.
//! Values are stored as JSON; expired entries behave as misses and are
//! evicted lazily on access. Serialization problems degrade to a miss or a
//! skipped store with a warning, never an error to the caller.
//!
//! `get_or_set` is check-fetch-store: concurrent misses on the same key may
//! each invoke the fetcher. Single-flight coalescing is a quality goal the
//! callers of this service have not needed.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::RateResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct MemoryCache {
    default_ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "cached value failed to deserialize, treating as miss");
                drop(entry);
                self.entries.remove(key);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value,
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
            Err(e) => warn!(key = key, error = %e, "value failed to serialize, skipping cache store"),
        }
    }

    /// Return the cached value or run `fetcher`, store its result, and
    /// return it. The fetcher runs at most once per call.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Option<Duration>,
    ) -> RateResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = RateResult<T>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            return Ok(hit);
        }
        let fetched = fetcher().await?;
        self.set(key, &fetched, ttl);
        Ok(fetched)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry whose key starts with `prefix`. Used to evict an
    /// org's listings after a write.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
