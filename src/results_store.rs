//! Audit trail of screening results.
//!
//! All rows live in `screening_results.json` as
//! `{ "schema_version": n, "rows": [...] }`; each row carries the timestamp
//! of the run that produced it. A batch is appended with a single atomic
//! document write.

use crate::results::ScreeningCriteriaResult;
use crate::storage_utils::AsyncStorageManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const SCHEMA_VERSION: u32 = 2;
pub const DEFAULT_RECENT_LIMIT: usize = 100;
const DOCUMENT: &str = "screening_results";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    /// Missing on rows written before runs were stamped.
    #[serde(default)]
    pub run_timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub row: ScreeningCriteriaResult,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ResultsDocument {
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    rows: Vec<StoredResult>,
}

/// Rows that still parse are kept; the rest are dropped with a warning.
fn migrate_rows(raw: Vec<Value>) -> Vec<StoredResult> {
    let total = raw.len();
    let rows: Vec<StoredResult> = raw
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if rows.len() < total {
        warn!(dropped = total - rows.len(), kept = rows.len(), "unreadable result rows dropped during migration");
    }
    rows
}

/// Interprets whatever is on disk, oldest layouts included. `None` means
/// nothing usable could be recovered.
fn upgrade(value: Value) -> Option<ResultsDocument> {
    match value {
        Value::Array(raw) => Some(ResultsDocument {
            schema_version: SCHEMA_VERSION,
            rows: migrate_rows(raw),
        }),
        Value::Object(mut map) => {
            let version = map
                .get("schema_version")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            match map.remove("rows") {
                Some(Value::Array(raw)) => {
                    if version != SCHEMA_VERSION {
                        info!(from = version, to = SCHEMA_VERSION, "migrating results document");
                    }
                    Some(ResultsDocument {
                        schema_version: SCHEMA_VERSION,
                        rows: migrate_rows(raw),
                    })
                }
                _ => None,
            }
        }
        _ => None,
    }
}

pub struct ResultsStore {
    storage: AsyncStorageManager,
    write_lock: Mutex<()>,
}

impl ResultsStore {
    pub fn new(storage: AsyncStorageManager) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Reads never write. An unreadable or unrecognised document loads as
    /// empty and is replaced by the next write under `write_lock`.
    async fn load_document(&self) -> ResultsDocument {
        let value: Option<Value> = match self.storage.load_optional(DOCUMENT).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "results document unreadable; the next write replaces it");
                return ResultsDocument::default();
            }
        };

        let Some(value) = value else {
            return ResultsDocument::default();
        };

        upgrade(value).unwrap_or_else(|| {
            warn!("results document has an unknown layout; the next write replaces it");
            ResultsDocument::default()
        })
    }

    /// Appends one run's rows, all stamped with the same run timestamp.
    /// An empty batch writes nothing.
    pub async fn save_batch(&self, rows: &[ScreeningCriteriaResult]) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;

        let mut doc = self.load_document().await;
        let run_timestamp = Some(Utc::now());
        doc.schema_version = SCHEMA_VERSION;
        doc.rows.extend(rows.iter().cloned().map(|row| StoredResult { run_timestamp, row }));

        self.storage.save(DOCUMENT, &doc).await?;
        debug!(rows = rows.len(), total = doc.rows.len(), "results batch saved");
        Ok(())
    }

    /// The `limit` most recent rows, newest run first. Rows without a run
    /// timestamp sort last.
    pub async fn load_recent(&self, limit: usize) -> anyhow::Result<Vec<StoredResult>> {
        let mut rows = self.load_document().await.rows;
        // Stable sort keeps each batch in its ranked order.
        rows.sort_by(|a, b| b.run_timestamp.cmp(&a.run_timestamp));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Removes every stored row and returns how many there were.
    pub async fn clear(&self) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let removed = self.load_document().await.rows.len();
        let doc = ResultsDocument {
            schema_version: SCHEMA_VERSION,
            rows: Vec::new(),
        };
        self.storage.save(DOCUMENT, &doc).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, score: f64) -> ScreeningCriteriaResult {
        ScreeningCriteriaResult {
            symbol: symbol.to_string(),
            composite_score: score,
            ..Default::default()
        }
    }

    async fn store() -> (tempfile::TempDir, ResultsStore) {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();
        (dir, ResultsStore::new(storage))
    }

    #[tokio::test]
    async fn batches_share_a_run_timestamp_and_load_newest_first() {
        let (_dir, store) = store().await;
        store.save_batch(&[row("AAPL", 2.0), row("MSFT", 1.0)]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.save_batch(&[row("NVDA", 3.0)]).await.unwrap();

        let recent = store.load_recent(DEFAULT_RECENT_LIMIT).await.unwrap();
        let symbols: Vec<&str> = recent.iter().map(|r| r.row.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NVDA", "AAPL", "MSFT"]);
        assert_eq!(recent[1].run_timestamp, recent[2].run_timestamp);

        assert_eq!(store.load_recent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let (dir, store) = store().await;
        store.save_batch(&[]).await.unwrap();
        assert!(!dir.path().join("screening_results.json").exists());
    }

    #[tokio::test]
    async fn legacy_array_rows_are_migrated() {
        let (dir, store) = store().await;
        tokio::fs::write(
            dir.path().join("screening_results.json"),
            br#"[{"symbol": "AAPL", "rsi": 35.0, "rsi_momentum": 1.5, "timeframe": "1h"}, 42]"#,
        )
        .await
        .unwrap();

        let recent = store.load_recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].row.symbol, "AAPL");
        assert_eq!(recent[0].row.rsi, Some(35.0));
        assert_eq!(recent[0].run_timestamp, None);

        store.save_batch(&[row("TSLA", 1.0)]).await.unwrap();
        let recent = store.load_recent(10).await.unwrap();
        assert_eq!(recent[0].row.symbol, "TSLA");
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn unreadable_document_is_replaced_on_next_write() {
        let (dir, store) = store().await;
        tokio::fs::write(dir.path().join("screening_results.json"), b"{ broken")
            .await
            .unwrap();

        assert!(store.load_recent(10).await.unwrap().is_empty());
        let untouched = tokio::fs::read(dir.path().join("screening_results.json")).await.unwrap();
        assert_eq!(untouched, b"{ broken");

        store.save_batch(&[row("AAPL", 1.0)]).await.unwrap();
        assert_eq!(store.load_recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_reports_removed_rows() {
        let (_dir, store) = store().await;
        store.save_batch(&[row("AAPL", 1.0), row("MSFT", 0.5)]).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.load_recent(10).await.unwrap().is_empty());
    }
}
