use async_trait::async_trait;
#[cfg(test)]
use mockall::{automock, predicate::*};
use thiserror::Error;

use crate::domain::entities::SecurityEvent;

#[derive(Debug, Error)]
pub enum SecurityEventError {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for security events. Callers never wait on it for a
/// policy decision.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    async fn record(&self, event: SecurityEvent) -> Result<(), SecurityEventError>;
}
