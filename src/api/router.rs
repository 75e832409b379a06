use axum::{
    http::{header, HeaderName},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;

use crate::api::handlers::{
    csrf_token_handler, health_handler, readiness_handler, CsrfTokenState, HealthState,
};
use crate::api::middleware::{
    audit_middleware, client_identity_middleware, create_cors_layer, csrf_middleware,
    rate_limit_middleware, request_logging_middleware, sanitization_middleware,
    security_headers_middleware, threat_detection_middleware, AuditMiddleware,
    ClientIdentityMiddleware, CsrfMiddleware, MiddlewareConfig, RateLimitMiddleware, RateLimiter,
    SanitizationMiddleware, SecurityHeadersMiddleware, ThreatDetectionMiddleware, ThreatDetector,
};
use crate::api::openapi::openapi_handler;
use crate::application::csrf_tokens::CsrfTokenService;
use crate::application::ports::{Clock, RateLimitStore};
use crate::application::security_events::SecurityEventLogger;

/// Errors raised while assembling the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid middleware configuration: {0}")]
    Config(String),
    #[error("invalid sanitizer pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Application state container
#[derive(Clone)]
pub struct AppState {
    pub config: MiddlewareConfig,
    pub clock: Arc<dyn Clock>,
    pub events: SecurityEventLogger,
    pub csrf_tokens: Arc<CsrfTokenService>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub pool: Option<PgPool>,
}

/// Build the full application: pipeline endpoints plus `business_routes`,
/// all behind the security pipeline.
///
/// The pipeline wraps the whole router rather than individual routes so
/// that sanitized paths are the ones routed.
pub fn create_router(state: &AppState, business_routes: Router) -> Result<Router, PipelineError> {
    let config = &state.config;
    config.validate().map_err(PipelineError::Config)?;

    let identity = Arc::new(ClientIdentityMiddleware::new(config.identity.clone()));
    let headers = Arc::new(
        SecurityHeadersMiddleware::new(&config.security_headers).map_err(PipelineError::Config)?,
    );
    let rate_limit = Arc::new(RateLimitMiddleware::new(
        RateLimiter::new(
            Arc::clone(&state.rate_limits),
            Arc::clone(&state.clock),
            config.rate_limiting.clone(),
        ),
        state.events.clone(),
    ));
    let sanitize = Arc::new(SanitizationMiddleware::new(
        config.sanitization.clone(),
        state.events.clone(),
        Arc::clone(&state.clock),
    )?);
    let threat = Arc::new(ThreatDetectionMiddleware::new(
        ThreatDetector::new(config.threat_detection.clone()),
        state.events.clone(),
        Arc::clone(&state.clock),
    ));
    let csrf = Arc::new(CsrfMiddleware::new(
        Arc::clone(&state.csrf_tokens),
        config.csrf.clone(),
        state.events.clone(),
        Arc::clone(&state.clock),
    ));
    let audit = Arc::new(AuditMiddleware::new(
        state.events.clone(),
        Arc::clone(&state.clock),
        config.audit.clone(),
    ));

    let csrf_state = CsrfTokenState {
        service: Arc::clone(&state.csrf_tokens),
        session_cookie: config.csrf.session_cookie.clone(),
    };
    let health_state = Arc::new(HealthState {
        pool: state.pool.clone(),
    });

    let routes = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/health/ready",
            get(readiness_handler).with_state(health_state),
        )
        .route(
            "/api/csrf-token",
            get(csrf_token_handler).with_state(csrf_state),
        )
        .route("/api-docs/openapi.json", get(openapi_handler))
        .merge(business_routes.layer(from_fn_with_state(audit, audit_middleware)));

    Ok(Router::new().fallback_service(routes).layer(
        ServiceBuilder::new()
            .layer(SetSensitiveRequestHeadersLayer::new([
                header::AUTHORIZATION,
                header::COOKIE,
                HeaderName::from_static("x-api-key"),
                HeaderName::from_static("x-csrf-token"),
            ]))
            .layer(from_fn(request_logging_middleware))
            .layer(from_fn_with_state(identity, client_identity_middleware))
            .layer(from_fn_with_state(headers, security_headers_middleware))
            .layer(create_cors_layer(&config.cors))
            .layer(from_fn_with_state(rate_limit, rate_limit_middleware))
            .layer(from_fn_with_state(sanitize, sanitization_middleware))
            .layer(from_fn_with_state(threat, threat_detection_middleware))
            .layer(from_fn_with_state(csrf, csrf_middleware)),
    ))
}
