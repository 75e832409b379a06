use axum::Json;
use utoipa::OpenApi;

use crate::api::errors::{ErrorBody, ErrorCode};
use crate::api::handlers::health::{HealthResponse, ReadinessResponse};
use crate::domain::entities::IssuedToken;

/// OpenAPI document for the pipeline's own endpoints
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Backoffice Shield",
        version = "1.0.0",
        description = "Security request pipeline for the donor-management back office"
    ),
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::health::readiness_handler,
        crate::api::handlers::csrf_token::csrf_token_handler,
    ),
    components(schemas(
        HealthResponse,
        ReadinessResponse,
        IssuedToken,
        ErrorBody,
        ErrorCode,
    )),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "csrf", description = "CSRF token retrieval")
    )
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_pipeline_endpoints() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| *p == "/health"));
        assert!(paths.iter().any(|p| *p == "/health/ready"));
        assert!(paths.iter().any(|p| *p == "/api/csrf-token"));
    }

    #[test]
    fn test_error_schema_registered() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.expect("components").schemas;
        assert!(schemas.contains_key("ErrorBody"));
        assert!(schemas.contains_key("IssuedToken"));
    }
}
