use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// State for the readiness probe.
#[derive(Clone, Default)]
pub struct HealthState {
    /// Present when security events are persisted to Postgres
    pub pool: Option<PgPool>,
}

/// Basic health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

/// Readiness response
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub service: String,
    /// `connected`, `disconnected`, `timeout` or `not_configured`
    pub database: String,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /health/ready
/// Readiness probe; checks the event database when one is configured.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service is not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_handler(
    State(state): State<Arc<HealthState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let start = Instant::now();

    let Some(pool) = state.pool.as_ref() else {
        return (
            StatusCode::OK,
            Json(readiness("ready", "not_configured", start, None)),
        );
    };

    let check = tokio::time::timeout(
        DB_CHECK_TIMEOUT,
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool),
    )
    .await;

    match check {
        Ok(Ok(_)) => (
            StatusCode::OK,
            Json(readiness("ready", "connected", start, None)),
        ),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(readiness(
                    "not_ready",
                    "disconnected",
                    start,
                    Some(sanitize_db_error(&e).to_string()),
                )),
            )
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(readiness(
                "not_ready",
                "timeout",
                start,
                Some("Database query timed out after 2 seconds".to_string()),
            )),
        ),
    }
}

fn readiness(status: &str, database: &str, start: Instant, error: Option<String>) -> ReadinessResponse {
    ReadinessResponse {
        status: status.to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        database: database.to_string(),
        response_time_ms: start.elapsed().as_millis() as u64,
        error,
    }
}

/// Database error text safe to return to a caller.
pub fn sanitize_db_error(error: &sqlx::Error) -> &'static str {
    match error {
        sqlx::Error::Configuration(_) => "Database configuration error",
        sqlx::Error::Database(_) => "Database operation error",
        sqlx::Error::Io(_) => "Database connection error",
        sqlx::Error::Tls(_) => "Database TLS error",
        sqlx::Error::Protocol(_) => "Database protocol error",
        sqlx::Error::PoolTimedOut => "Database pool timeout",
        sqlx::Error::PoolClosed => "Database pool closed",
        sqlx::Error::WorkerCrashed => "Database worker error",
        _ => "Database error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler() {
        let Json(body) = health_handler().await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, "backoffice_shield");
    }

    #[tokio::test]
    async fn test_readiness_without_database() {
        let (status, Json(body)) = readiness_handler(State(Arc::new(HealthState::default()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.database, "not_configured");
        assert!(body.error.is_none());
    }

    #[test]
    fn test_db_error_sanitization() {
        let config_err = sqlx::Error::Configuration("host=db password=secret".into());
        assert_eq!(sanitize_db_error(&config_err), "Database configuration error");

        let io_err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused",
        ));
        assert_eq!(sanitize_db_error(&io_err), "Database connection error");

        assert_eq!(sanitize_db_error(&sqlx::Error::PoolTimedOut), "Database pool timeout");
        assert_eq!(sanitize_db_error(&sqlx::Error::RowNotFound), "Database error");
    }
}
