use async_trait::async_trait;
#[cfg(test)]
use mockall::{automock, predicate::*};

use crate::domain::entities::SecurityEvent;

/// Append-only store of security events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecurityEventRepository: Send + Sync {
    async fn append(&self, event: &SecurityEvent) -> Result<(), SecurityEventRepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityEventRepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
