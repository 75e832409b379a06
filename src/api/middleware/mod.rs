//! Security pipeline stages.
//!
//! Each stage is a struct holding its configuration and collaborators plus
//! a free function usable with `axum::middleware::from_fn_with_state`.

pub mod audit;
pub mod client_identity;
pub mod config;
pub mod cors;
pub mod csrf;
pub mod input_sanitization;
pub mod payload;
pub mod rate_limiting;
pub mod request_logging;
pub mod security_config;
pub mod security_headers;
pub mod threat_detection;

pub use audit::{audit_middleware, AuditConfig, AuditMiddleware};
pub use client_identity::{client_identity_middleware, ClientIdentityMiddleware, IdentityConfig};
pub use config::MiddlewareConfig;
pub use cors::{create_cors_layer, CorsConfig};
pub use csrf::{csrf_middleware, CsrfConfig, CsrfMiddleware};
pub use input_sanitization::{sanitization_middleware, SanitizationConfig, SanitizationMiddleware};
pub use payload::OriginalPayload;
pub use rate_limiting::{
    rate_limit_middleware, LimitRule, LimiterKind, RateDecision, RateLimitConfig,
    RateLimitMiddleware, RateLimiter,
};
pub use request_logging::{request_logging_middleware, RequestId};
pub use security_config::SecurityHeadersConfig;
pub use security_headers::{security_headers_middleware, SecurityHeadersMiddleware};
pub use threat_detection::{
    threat_detection_middleware, ThreatDetectionConfig, ThreatDetectionMiddleware, ThreatDetector,
};
