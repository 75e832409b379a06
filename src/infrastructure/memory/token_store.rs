use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::application::ports::TokenStore;
use crate::domain::entities::CsrfTokenRecord;
use crate::domain::errors::StoreError;
use crate::domain::value_objects::SessionId;

/// Process-local token store. Only correct for a single instance.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: DashMap<SessionId, CsrfTokenRecord>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<CsrfTokenRecord>, StoreError> {
        Ok(self.tokens.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn set(&self, record: CsrfTokenRecord) -> Result<(), StoreError> {
        self.tokens.insert(record.session_id().clone(), record);
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.tokens.remove(session_id);
        Ok(())
    }

    async fn delete_if_expired(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tokens
            .remove_if(session_id, |_, record| record.is_expired(now))
            .is_some())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.tokens.len()))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.tokens.len())
    }
}
