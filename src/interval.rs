//! Bar intervals and the per-interval constants that hang off them: cache
//! TTLs, bars per day, provider interval strings and default history periods.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::FifteenMinutes,
        Interval::OneHour,
        Interval::FourHours,
        Interval::OneDay,
        Interval::OneWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::FifteenMinutes => "15m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1W",
        }
    }

    /// How long a cached series for this interval stays fresh.
    pub fn cache_ttl(&self) -> Duration {
        let secs = match self {
            Interval::FifteenMinutes => 900,
            Interval::OneHour => 3600,
            Interval::FourHours => 14_400,
            Interval::OneDay => 86_400,
            Interval::OneWeek => 604_800,
        };
        Duration::from_secs(secs)
    }

    /// Bars in one calendar day. Weekly bars have no integral answer and are
    /// handled by the momentum window rules instead.
    pub fn bars_per_day(&self) -> Option<usize> {
        match self {
            Interval::FifteenMinutes => Some(96),
            Interval::OneHour => Some(24),
            Interval::FourHours => Some(6),
            Interval::OneDay => Some(1),
            Interval::OneWeek => None,
        }
    }

    /// Interval string understood by the price-history provider, and how many
    /// provider bars make up one of ours. The provider has no 4h bars, so 4h
    /// series are built from hourly ones.
    pub fn provider_interval(&self) -> (&'static str, usize) {
        match self {
            Interval::FifteenMinutes => ("15m", 1),
            Interval::OneHour => ("1h", 1),
            Interval::FourHours => ("1h", 4),
            Interval::OneDay => ("1d", 1),
            Interval::OneWeek => ("1wk", 1),
        }
    }

    /// Length of one bar.
    pub fn bar_duration(&self) -> chrono::Duration {
        match self {
            Interval::FifteenMinutes => chrono::Duration::minutes(15),
            Interval::OneHour => chrono::Duration::hours(1),
            Interval::FourHours => chrono::Duration::hours(4),
            Interval::OneDay => chrono::Duration::days(1),
            Interval::OneWeek => chrono::Duration::weeks(1),
        }
    }

    /// History requested for crypto assets at this interval.
    pub fn crypto_period(&self) -> Period {
        let raw = match self {
            Interval::FifteenMinutes => "7d",
            Interval::OneHour => "60d",
            Interval::FourHours => "120d",
            Interval::OneDay => "2y",
            Interval::OneWeek => "5y",
        };
        Period(raw.to_string())
    }

    /// History requested for stocks. Intraday 15m data is only served for the
    /// last 60 days.
    pub fn stock_period(&self) -> Period {
        match self {
            Interval::FifteenMinutes => Period("60d".to_string()),
            _ => Period("6mo".to_string()),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "15m" => Ok(Interval::FifteenMinutes),
            "1h" | "60m" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1d" | "1D" => Ok(Interval::OneDay),
            "1W" | "1w" | "1wk" => Ok(Interval::OneWeek),
            other => Err(format!("unsupported interval '{}'", other)),
        }
    }
}

/// A provider history period such as `60d`, `6mo`, `2y` or `max`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period(String);

fn period_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[1-9]\d*(?:d|wk|mo|y)|ytd|max)$").expect("period pattern is valid")
    })
}

impl Period {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if period_pattern().is_match(s) {
            Ok(Period(s.to_string()))
        } else {
            Err(format!("unsupported period '{}'", s))
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
