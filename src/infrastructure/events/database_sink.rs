use async_trait::async_trait;
use std::sync::Arc;

use super::TracingSecurityEventSink;
use crate::application::ports::{SecurityEventError, SecurityEventRepository, SecurityEventSink};
use crate::domain::entities::SecurityEvent;

/// Persists security events; falls back to the log when the database
/// write fails so an event is never silently dropped.
pub struct DatabaseSecurityEventSink {
    repository: Arc<dyn SecurityEventRepository>,
}

impl DatabaseSecurityEventSink {
    pub fn new(repository: Arc<dyn SecurityEventRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl SecurityEventSink for DatabaseSecurityEventSink {
    async fn record(&self, event: SecurityEvent) -> Result<(), SecurityEventError> {
        match self.repository.append(&event).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist security event");
                TracingSecurityEventSink.record(event).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockSecurityEventRepository, SecurityEventRepositoryError};
    use crate::domain::entities::{SecurityEventType, Severity};
    use chrono::Utc;

    fn event() -> SecurityEvent {
        SecurityEvent::new(
            SecurityEventType::CsrfValidationFailed,
            Severity::Medium,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_appends_to_repository() {
        let mut repo = MockSecurityEventRepository::new();
        repo.expect_append()
            .withf(|e| e.event_type == SecurityEventType::CsrfValidationFailed)
            .times(1)
            .returning(|_| Ok(()));

        let sink = DatabaseSecurityEventSink::new(Arc::new(repo));
        assert!(sink.record(event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_falls_back_when_database_fails() {
        let mut repo = MockSecurityEventRepository::new();
        repo.expect_append()
            .times(1)
            .returning(|_| Err(SecurityEventRepositoryError::Database(sqlx::Error::PoolClosed)));

        let sink = DatabaseSecurityEventSink::new(Arc::new(repo));
        assert!(sink.record(event()).await.is_ok());
    }
}
