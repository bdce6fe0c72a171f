//! File-backed key/value cache with call-site TTLs.
//!
//! One JSON document per key, shaped `{ "timestamp": <ISO-8601>, "data": ... }`.
//! The TTL is supplied on every read, so one physical entry can serve callers
//! with different freshness policies. Expired entries are left on disk and
//! simply reported as absent until [`CacheStore::clear`] runs.

use crate::interval::{Interval, Period};
use crate::storage_utils::AsyncStorageManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T> CacheEntry<T> {
    /// An entry is fresh while its age is within `ttl`. A zero TTL never
    /// matches, so `get(key, 0)` right after `set` is a miss.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        if ttl.is_zero() {
            return false;
        }
        match (now - self.timestamp).to_std() {
            Ok(age) => age <= ttl,
            // Written "in the future" (clock skew): treat as fresh.
            Err(_) => true,
        }
    }
}

/// Cache keys for the descriptors the screener fetches.
pub mod keys {
    use super::*;

    pub fn price_history(symbol: &str, period: &Period, interval: Interval) -> String {
        format!("yahoo_{}_{}_{}", symbol, period, interval)
    }

    pub fn market_cap(provider_id: &str) -> String {
        format!("market_cap_{}", provider_id)
    }

    pub fn stock_info(symbol: &str) -> String {
        format!("stock_info_{}", symbol)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySize {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_size: u64,
    /// Largest entries first.
    pub per_entry_size: Vec<EntrySize>,
}

impl CacheStats {
    pub fn total_size_mb(&self) -> f64 {
        self.total_size as f64 / (1024.0 * 1024.0)
    }
}

pub struct CacheStore {
    storage: AsyncStorageManager,
    // Single writer: set/clear never interleave on the same directory.
    write_lock: Mutex<()>,
}

impl CacheStore {
    pub fn new(storage: AsyncStorageManager) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn open<P: Into<std::path::PathBuf>>(dir: P) -> anyhow::Result<Self> {
        Ok(Self::new(AsyncStorageManager::new(dir).await?))
    }

    async fn load_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        match self.storage.load_optional(key).await {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "unreadable cache entry treated as miss");
                None
            }
        }
    }

    /// Returns the payload if an entry exists, parses, and is younger than
    /// `ttl`. Unreadable or malformed entries are misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let entry: CacheEntry<T> = self.load_entry(key).await?;

        if entry.is_fresh(ttl, Utc::now()) {
            debug!(key, "cache hit");
            Some(entry.data)
        } else {
            debug!(key, written = %entry.timestamp, "cache entry expired");
            None
        }
    }

    /// The payload regardless of age. Used only when the provider cannot be
    /// asked for a fresh value.
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry: CacheEntry<T> = self.load_entry(key).await?;
        debug!(key, written = %entry.timestamp, "serving cache entry regardless of age");
        Some(entry.data)
    }

    /// Writes (or overwrites) an entry stamped with the current time. Write
    /// failures are logged and swallowed: the cache is an optimisation.
    pub async fn set<T: Serialize>(&self, key: &str, data: &T) {
        let _guard = self.write_lock.lock().await;
        let entry = CacheEntry {
            timestamp: Utc::now(),
            data,
        };
        if let Err(e) = self.storage.save(key, &entry).await {
            warn!(key, error = %e, "cache write failed");
        }
    }

    pub async fn clear(&self) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let removed = self.storage.clear().await?;
        debug!(removed, dir = ?self.storage.base_dir, "cache cleared");
        Ok(removed)
    }

    pub async fn stats(&self) -> anyhow::Result<CacheStats> {
        let mut per_entry_size: Vec<EntrySize> = self
            .storage
            .list()
            .await?
            .into_iter()
            .map(|f| EntrySize {
                name: f.name,
                size: f.size,
                modified: f.modified.map(DateTime::<Utc>::from),
            })
            .collect();
        per_entry_size.sort_by(|a, b| b.size.cmp(&a.size));

        Ok(CacheStats {
            file_count: per_entry_size.len(),
            total_size: per_entry_size.iter().map(|e| e.size).sum(),
            per_entry_size,
        })
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.storage.base_dir
    }
}
