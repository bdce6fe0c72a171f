use std::time::Duration;
use thiserror::Error;

/// Failures raised while talking to an upstream provider.
///
/// None of these abort a screening batch: the fetcher and resolvers log
/// them and treat the affected symbol as unscreenable for the run.
#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream rate limit hit (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No data returned for {0}")]
    Empty(String),
}

impl ScreenerError {
    /// Transport-level failures (connect, timeout) mean the provider itself
    /// is unreachable, as opposed to a bad answer for one symbol.
    pub fn is_transport(&self) -> bool {
        match self {
            ScreenerError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ScreenerError {
    fn from(err: serde_json::Error) -> Self {
        ScreenerError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScreenerError>;
