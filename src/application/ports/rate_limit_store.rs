use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
#[cfg(test)]
use mockall::{automock, predicate::*};

use crate::domain::entities::RateWindow;
use crate::domain::errors::StoreError;
use crate::domain::value_objects::ClientKey;

/// Port for fixed-window counters.
///
/// `scope` separates limiter classes so the same client has an
/// independent counter per class.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Reset the window if it elapsed, then count one request. Atomic per key.
    async fn hit(
        &self,
        scope: &str,
        key: &ClientKey,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<RateWindow, StoreError>;

    /// Current window without counting. Elapsed windows read as empty.
    async fn peek(
        &self,
        scope: &str,
        key: &ClientKey,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<RateWindow, StoreError>;

    /// Drop counters whose window elapsed before `now`.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
