use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::application::ports::RateLimitStore;
use crate::domain::entities::RateWindow;
use crate::domain::errors::StoreError;
use crate::domain::value_objects::ClientKey;

#[derive(Debug, Clone, Copy)]
struct Counter {
    window: RateWindow,
    length: TimeDelta,
}

/// Process-local fixed-window counters.
///
/// The DashMap entry guard holds the shard lock for the whole
/// reset-or-increment, so concurrent hits on one key never lose counts.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    counters: DashMap<(String, ClientKey), Counter>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        scope: &str,
        key: &ClientKey,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<RateWindow, StoreError> {
        let mut entry = self
            .counters
            .entry((scope.to_string(), key.clone()))
            .or_insert_with(|| Counter {
                window: RateWindow::start(now),
                length: window,
            });
        entry.length = window;
        entry.window.hit(window, now);
        Ok(entry.window)
    }

    async fn peek(
        &self,
        scope: &str,
        key: &ClientKey,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<RateWindow, StoreError> {
        let current = self
            .counters
            .get(&(scope.to_string(), key.clone()))
            .map(|entry| entry.window)
            .filter(|w| !w.is_elapsed(window, now));
        Ok(current.unwrap_or_else(|| RateWindow::start(now)))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.counters.len();
        self.counters
            .retain(|_, counter| !counter.window.is_elapsed(counter.length, now));
        Ok(before.saturating_sub(self.counters.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let store = InMemoryRateLimitStore::new();
        let key = ClientKey::ip("10.0.0.1");
        let window = TimeDelta::minutes(1);

        store.hit("api", &key, window, now()).await.unwrap();
        store.hit("api", &key, window, now()).await.unwrap();
        let payments = store.hit("payments", &key, window, now()).await.unwrap();

        assert_eq!(payments.count, 1);
        assert_eq!(store.peek("api", &key, window, now()).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_peek_does_not_count() {
        let store = InMemoryRateLimitStore::new();
        let key = ClientKey::ip("10.0.0.2");
        let window = TimeDelta::minutes(15);

        assert_eq!(store.peek("auth", &key, window, now()).await.unwrap().count, 0);
        assert_eq!(store.peek("auth", &key, window, now()).await.unwrap().count, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_drops_elapsed_windows() {
        let store = InMemoryRateLimitStore::new();
        let a = ClientKey::ip("10.0.0.3");
        let b = ClientKey::ip("10.0.0.4");

        store.hit("payments", &a, TimeDelta::minutes(1), now()).await.unwrap();
        store.hit("api", &b, TimeDelta::minutes(15), now()).await.unwrap();

        let removed = store.sweep(now() + TimeDelta::minutes(2)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_hits_are_not_lost() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let key = ClientKey::ip("10.0.0.5");
        let mut handles = Vec::new();

        for _ in 0..50 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store
                    .hit("api", &key, TimeDelta::minutes(15), now())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let window = store
            .peek("api", &key, TimeDelta::minutes(15), now())
            .await
            .unwrap();
        assert_eq!(window.count, 50);
    }
}
