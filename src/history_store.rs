//! Secondary persisted store of raw OHLCV history.
//!
//! One document per (symbol, interval), holding bars keyed by timestamp.
//! Writes upsert: a bar at an existing timestamp replaces the stored one,
//! new timestamps are added. Entries never expire; this is the fallback the
//! fetcher reads when live data is unavailable.

use crate::interval::Interval;
use crate::price_series::{Bar, PriceSeries};
use crate::storage_utils::AsyncStorageManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct StoredBars {
    symbol: String,
    interval: Interval,
    updated: DateTime<Utc>,
    bars: Vec<Bar>,
}

pub struct HistoryStore {
    storage: AsyncStorageManager,
    write_lock: Mutex<()>,
}

fn document_name(symbol: &str, interval: Interval) -> String {
    format!("{}_{}", symbol.to_uppercase(), interval)
}

impl HistoryStore {
    pub fn new(storage: AsyncStorageManager) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn open<P: Into<std::path::PathBuf>>(dir: P) -> anyhow::Result<Self> {
        Ok(Self::new(AsyncStorageManager::new(dir).await?))
    }

    /// Everything stored for `symbol` at `interval`, if anything is.
    pub async fn load(&self, symbol: &str, interval: Interval) -> anyhow::Result<Option<PriceSeries>> {
        let stored: Option<StoredBars> = self
            .storage
            .load_optional(&document_name(symbol, interval))
            .await?;
        Ok(stored
            .map(|s| PriceSeries::new(s.bars))
            .filter(|series| !series.is_empty()))
    }

    /// Merges `series` into the stored bars and returns the stored bar count.
    ///
    /// A document that cannot be parsed is left untouched and the write is
    /// refused; history is never recreated from scratch.
    pub async fn upsert(&self, symbol: &str, interval: Interval, series: &PriceSeries) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let name = document_name(symbol, interval);

        let existing: Option<StoredBars> = self.storage.load_optional(&name).await?;
        let mut by_time: BTreeMap<DateTime<Utc>, Bar> = existing
            .map(|s| s.bars)
            .unwrap_or_default()
            .into_iter()
            .map(|bar| (bar.timestamp, bar))
            .collect();
        for bar in series.bars() {
            by_time.insert(bar.timestamp, *bar);
        }

        let doc = StoredBars {
            symbol: symbol.to_uppercase(),
            interval,
            updated: Utc::now(),
            bars: by_time.into_values().collect(),
        };
        self.storage.save(&name, &doc).await?;
        debug!(symbol, %interval, bars = doc.bars.len(), "history upserted");
        Ok(doc.bars.len())
    }

    /// Best-effort `upsert` used on the fetch path.
    pub async fn record(&self, symbol: &str, interval: Interval, series: &PriceSeries) {
        if let Err(e) = self.upsert(symbol, interval, series).await {
            warn!(symbol, %interval, error = %e, "history write failed");
        }
    }

    pub async fn clear(&self) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.storage.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_series::tests::daily_series;

    #[tokio::test]
    async fn upsert_merges_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).await.unwrap();

        store
            .upsert("aapl", Interval::OneDay, &daily_series(&[1.0, 2.0, 3.0]))
            .await
            .unwrap();
        // Overlaps the first three days with new closes and adds a fourth.
        let count = store
            .upsert("AAPL", Interval::OneDay, &daily_series(&[10.0, 20.0, 30.0, 40.0]))
            .await
            .unwrap();
        assert_eq!(count, 4);

        let loaded = store.load("AAPL", Interval::OneDay).await.unwrap().unwrap();
        assert_eq!(loaded.closes(), vec![10.0, 20.0, 30.0, 40.0]);
        assert!(store.load("AAPL", Interval::OneHour).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_history_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).await.unwrap();
        let path = dir.path().join("MSFT_1d.json");
        tokio::fs::write(&path, b"garbage").await.unwrap();

        assert!(
            store
                .upsert("MSFT", Interval::OneDay, &daily_series(&[1.0]))
                .await
                .is_err()
        );
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"garbage");
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).await.unwrap();
        store.record("BTC-USD", Interval::OneHour, &daily_series(&[1.0, 2.0])).await;

        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.load("BTC-USD", Interval::OneHour).await.unwrap().is_none());
    }
}
