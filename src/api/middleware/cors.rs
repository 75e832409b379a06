use axum::http::{header, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Exact origins allowed in production
    pub allowed_origins: Vec<String>,
    /// Mirror any request origin (development only)
    pub allow_any_origin: bool,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_any_origin: false,
            allow_credentials: true,
            max_age_secs: 86400, // 24 hours
        }
    }
}

impl CorsConfig {
    pub fn production(allowed_origins: Vec<String>) -> Self {
        Self {
            allowed_origins,
            ..Self::default()
        }
    }

    pub fn development() -> Self {
        Self {
            allow_any_origin: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.allow_any_origin && self.allowed_origins.is_empty() {
            return Err("At least one allowed CORS origin is required".to_string());
        }
        for origin in &self.allowed_origins {
            if origin == "*" {
                return Err("Wildcard origin cannot be combined with credentials".to_string());
            }
            if HeaderValue::from_str(origin).is_err() {
                return Err(format!("Invalid CORS origin: {}", origin));
            }
        }
        Ok(())
    }
}

fn allowed_headers() -> [HeaderName; 6] {
    [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        HeaderName::from_static("x-request-id"),
        HeaderName::from_static("x-api-key"),
        HeaderName::from_static("x-csrf-token"),
        HeaderName::from_static("x-user-id"),
    ]
}

/// Build the CORS layer. Credentials are allowed, so origins are either an
/// explicit list or mirrored from the request, never `*`.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allow_any_origin {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers(allowed_headers())
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("ratelimit-limit"),
            HeaderName::from_static("ratelimit-remaining"),
            header::RETRY_AFTER,
        ])
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs))
}
