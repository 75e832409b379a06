use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::{automock, predicate::*};

use crate::domain::entities::CsrfTokenRecord;
use crate::domain::errors::StoreError;
use crate::domain::value_objects::SessionId;

/// Port for CSRF token persistence, keyed by session.
///
/// Holds at most one record per session: `set` replaces whatever was
/// there. Implementations shared between instances must make `set` and
/// `delete` visible to every instance before returning.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, session_id: &SessionId) -> Result<Option<CsrfTokenRecord>, StoreError>;

    async fn set(&self, record: CsrfTokenRecord) -> Result<(), StoreError>;

    async fn delete(&self, session_id: &SessionId) -> Result<(), StoreError>;

    /// Remove the session's record only if it is expired at `now`, as one
    /// atomic step. A record replaced since the caller read it survives.
    async fn delete_if_expired(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Evict every record expired at `now`; returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}
