use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Decides how long a batch loop pauses before its next upstream-bound step.
///
/// The screener only asks the policy; whether that means sleeping, yielding
/// or nothing at all is up to the implementation.
#[async_trait]
pub trait PacingPolicy: Send + Sync {
    /// Called before the item at `index` (0-based) of a batch.
    async fn before_item(&self, index: usize);
}

/// A fixed pause between consecutive items; the first item goes straight
/// through.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub delay: Duration,
}

impl FixedDelay {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
        }
    }
}

#[async_trait]
impl PacingPolicy for FixedDelay {
    async fn before_item(&self, index: usize) {
        if index > 0 && !self.delay.is_zero() {
            debug!(index, delay_ms = self.delay.as_millis() as u64, "pacing before next item");
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// No pacing at all; used when everything is served from cache and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl PacingPolicy for NoPacing {
    async fn before_item(&self, _index: usize) {}
}
