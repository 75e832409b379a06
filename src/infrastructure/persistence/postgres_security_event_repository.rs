use async_trait::async_trait;
use sqlx::PgPool;

use crate::application::ports::{SecurityEventRepository, SecurityEventRepositoryError};
use crate::domain::entities::SecurityEvent;

pub struct PostgresSecurityEventRepository {
    pool: PgPool,
}

impl PostgresSecurityEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityEventRepository for PostgresSecurityEventRepository {
    async fn append(&self, event: &SecurityEvent) -> Result<(), SecurityEventRepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO security_events (
                id, event_type, severity, actor, ip_address, path, occurred_at, details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(event.event_type.as_str())
        .bind(event.severity.as_str())
        .bind(event.actor.as_deref())
        .bind(event.ip_address.as_deref())
        .bind(event.path.as_deref())
        .bind(event.timestamp)
        .bind(sqlx::types::Json(&event.details))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
