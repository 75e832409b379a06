use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info};

use crate::application::csrf_tokens::CsrfTokenService;
use crate::application::ports::{Clock, RateLimitStore};
use crate::domain::errors::StoreError;

/// Outcome of one sweep cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepResult {
    pub expired_tokens: usize,
    pub stale_rate_windows: usize,
}

impl SweepResult {
    pub fn has_deletions(&self) -> bool {
        self.expired_tokens > 0 || self.stale_rate_windows > 0
    }
}

/// Periodic eviction of expired CSRF tokens and elapsed rate windows.
///
/// Validation already rejects expired tokens; sweeping only bounds memory.
pub struct TokenSweeper {
    tokens: Arc<CsrfTokenService>,
    rate_limits: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl TokenSweeper {
    pub fn new(
        tokens: Arc<CsrfTokenService>,
        rate_limits: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            tokens,
            rate_limits,
            clock,
            interval,
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepResult, StoreError> {
        let expired_tokens = self.tokens.sweep().await?;
        let stale_rate_windows = self.rate_limits.sweep(self.clock.now()).await?;
        Ok(SweepResult {
            expired_tokens,
            stale_rate_windows,
        })
    }

    pub async fn run(self: Arc<Self>) {
        info!(interval = ?self.interval, "Starting token sweeper");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; nothing has expired yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(result) if result.has_deletions() => info!(
                    expired_tokens = result.expired_tokens,
                    stale_rate_windows = result.stale_rate_windows,
                    "Sweep completed"
                ),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Sweep failed"),
            }
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
