//! OHLCV bars, the immutable series built from them, and the
//! column-oriented frame used on the wire and in the cache.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Bars in strictly increasing timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Sorts the bars and drops duplicate timestamps (the later bar wins), so
    /// the ordering invariant holds whatever order the input arrived in.
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Merges consecutive bars into buckets of `bucket_secs` aligned to the
    /// Unix epoch (UTC). Used to build 4h bars from hourly ones.
    pub fn resample(&self, bucket_secs: i64) -> PriceSeries {
        if bucket_secs <= 0 {
            return self.clone();
        }
        let mut out: Vec<Bar> = Vec::new();
        let mut current_bucket: Option<i64> = None;

        for bar in &self.bars {
            let ts = bar.timestamp.timestamp();
            let bucket = ts - ts.rem_euclid(bucket_secs);
            match (current_bucket, out.last_mut()) {
                (Some(b), Some(acc)) if b == bucket => {
                    acc.high = acc.high.max(bar.high);
                    acc.low = acc.low.min(bar.low);
                    acc.close = bar.close;
                    acc.volume += bar.volume;
                }
                _ => {
                    let timestamp = DateTime::from_timestamp(bucket, 0).unwrap_or(bar.timestamp);
                    out.push(Bar { timestamp, ..*bar });
                    current_bucket = Some(bucket);
                }
            }
        }
        PriceSeries { bars: out }
    }
}

// --- Column-oriented frame ---

/// Column-oriented OHLCV payload: field name -> values, plus a parallel list
/// of date strings. Providers may hand back suffixed or tuple-style column
/// names; [`ColumnFrame::into_series`] flattens those.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnFrame {
    #[serde(alias = "Date", alias = "Datetime", alias = "index")]
    pub date: Vec<String>,
    #[serde(flatten)]
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

const OHLCV: [&str; 5] = ["open", "high", "low", "close", "volume"];

fn tuple_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]*)['"]\s*\)$"#)
            .expect("tuple column pattern is valid")
    })
}

/// Maps a provider column name onto a canonical lowercase OHLCV field.
///
/// Handles plain names (`Close`), two-level tuple names (`('Close', 'AAPL')`)
/// and symbol-suffixed names (`Close_AAPL`, `close|aapl`).
pub fn canonical_column(raw: &str, symbol: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_lowercase();

    let field = if let Some(caps) = tuple_column_pattern().captures(&lowered) {
        caps.get(1).map(|m| m.as_str().trim().to_string())?
    } else {
        let symbol = symbol.to_lowercase();
        ['_', '|', '.', ' ']
            .iter()
            .find_map(|sep| {
                lowered
                    .strip_suffix(symbol.as_str())
                    .and_then(|rest| rest.strip_suffix(*sep))
                    .map(str::to_string)
            })
            .unwrap_or(lowered)
    };

    OHLCV.iter().copied().find(|name| *name == field)
}

pub fn parse_bar_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

impl ColumnFrame {
    pub fn from_series(series: &PriceSeries) -> Self {
        let bars = series.bars();
        let mut columns = BTreeMap::new();
        columns.insert("open".to_string(), bars.iter().map(|b| Some(b.open)).collect());
        columns.insert("high".to_string(), bars.iter().map(|b| Some(b.high)).collect());
        columns.insert("low".to_string(), bars.iter().map(|b| Some(b.low)).collect());
        columns.insert("close".to_string(), bars.iter().map(|b| Some(b.close)).collect());
        columns.insert("volume".to_string(), bars.iter().map(|b| Some(b.volume)).collect());
        Self {
            date: bars
                .iter()
                .map(|b| b.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
                .collect(),
            columns,
        }
    }

    /// Flattens column names and builds a series. Rows with an unreadable
    /// date or a missing price are dropped; a missing volume counts as zero.
    /// Returns `None` when nothing usable remains.
    pub fn into_series(self, symbol: &str) -> Option<PriceSeries> {
        let mut canonical: BTreeMap<&'static str, Vec<Option<f64>>> = BTreeMap::new();
        for (name, values) in self.columns {
            if let Some(field) = canonical_column(&name, symbol) {
                canonical.entry(field).or_insert(values);
            }
        }

        let column = |name: &str| canonical.get(name);
        let (open, high, low, close) = (
            column("open")?,
            column("high")?,
            column("low")?,
            column("close")?,
        );
        let volume = column("volume");

        let bars: Vec<Bar> = self
            .date
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let value = |col: &Vec<Option<f64>>| col.get(i).copied().flatten().filter(|v| v.is_finite());
                Some(Bar {
                    timestamp: parse_bar_time(raw)?,
                    open: value(open)?,
                    high: value(high)?,
                    low: value(low)?,
                    close: value(close)?,
                    volume: volume.and_then(|v| value(v)).unwrap_or(0.0),
                })
            })
            .collect();

        if bars.is_empty() {
            None
        } else {
            Some(PriceSeries::new(bars))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Daily bars starting 2024-01-01 with the given closes.
    pub(crate) fn daily_series(closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1_000.0,
            })
            .collect();
        PriceSeries::new(bars)
    }

    #[test]
    fn new_sorts_and_dedups_by_timestamp() {
        let mut bars = daily_series(&[1.0, 2.0, 3.0]).bars().to_vec();
        bars.reverse();
        let mut dup = bars[0];
        dup.close = 9.0;
        bars.push(dup);

        let series = PriceSeries::new(bars);
        assert_eq!(series.closes(), vec![1.0, 2.0, 9.0]);
        assert!(series.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn canonical_column_flattens_two_level_names() {
        assert_eq!(canonical_column("Close", "AAPL"), Some("close"));
        assert_eq!(canonical_column("('Close', 'AAPL')", "AAPL"), Some("close"));
        assert_eq!(canonical_column("Volume_AAPL", "AAPL"), Some("volume"));
        assert_eq!(canonical_column("high|btc-usd", "BTC-USD"), Some("high"));
        assert_eq!(canonical_column("Adj Close", "AAPL"), None);
        assert_eq!(canonical_column("Dividends", "AAPL"), None);
    }

    #[test]
    fn frame_round_trips_through_series() {
        let series = daily_series(&[10.0, 11.0, 12.0]);
        let frame = ColumnFrame::from_series(&series);
        assert_eq!(frame.into_series("X"), Some(series));
    }

    #[test]
    fn suffixed_frame_is_normalized_and_incomplete_rows_dropped() {
        let mut columns = BTreeMap::new();
        columns.insert("('Open', 'MSFT')".to_string(), vec![Some(1.0), Some(2.0), None]);
        columns.insert("('High', 'MSFT')".to_string(), vec![Some(1.5), Some(2.5), Some(3.5)]);
        columns.insert("('Low', 'MSFT')".to_string(), vec![Some(0.5), Some(1.5), Some(2.5)]);
        columns.insert("('Close', 'MSFT')".to_string(), vec![Some(1.2), Some(2.2), Some(3.2)]);
        let frame = ColumnFrame {
            date: vec![
                "2024-01-01 00:00:00".into(),
                "2024-01-02".into(),
                "2024-01-03T00:00:00Z".into(),
            ],
            columns,
        };

        let series = frame.into_series("MSFT").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![1.2, 2.2]);
        assert_eq!(series.volumes(), vec![0.0, 0.0]);
    }

    #[test]
    fn frame_without_close_column_is_unusable() {
        let mut columns = BTreeMap::new();
        columns.insert("open".to_string(), vec![Some(1.0)]);
        let frame = ColumnFrame {
            date: vec!["2024-01-01".into()],
            columns,
        };
        assert!(frame.into_series("X").is_none());
    }

    #[test]
    fn resample_builds_four_hour_bars() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..8)
            .map(|i| Bar {
                timestamp: start + chrono::Duration::hours(i),
                open: i as f64,
                high: i as f64 + 0.5,
                low: i as f64 - 0.5,
                close: i as f64 + 0.25,
                volume: 10.0,
            })
            .collect();

        let four_hour = PriceSeries::new(bars).resample(4 * 3600);
        let out = four_hour.bars();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].open, 0.0);
        assert_eq!(out[0].high, 3.5);
        assert_eq!(out[0].low, -0.5);
        assert_eq!(out[0].close, 3.25);
        assert_eq!(out[0].volume, 40.0);
        assert_eq!(out[1].timestamp, start + chrono::Duration::hours(4));
    }
}
