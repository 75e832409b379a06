use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::api::errors::{ApiError, ErrorCode};
use crate::api::middleware::client_identity;
use crate::api::middleware::payload::{decode_pairs, is_form, is_json, take_body};
use crate::application::csrf_tokens::{constant_time_eq, CsrfTokenService};
use crate::application::ports::Clock;
use crate::application::security_events::SecurityEventLogger;
use crate::domain::entities::{SecurityEvent, SecurityEventType, Severity};

pub const API_KEY_HEADER: &str = "x-api-key";

/// CSRF protection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Paths that never require a token
    pub exempt_paths: Vec<String>,
    /// Pre-shared keys for server-to-server callers
    #[serde(skip_serializing, default)]
    pub api_keys: Vec<String>,
    pub header_name: String,
    /// Body and query field carrying the token when the header is absent
    pub field_name: String,
    pub session_cookie: String,
    pub max_body_bytes: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            exempt_paths: [
                "/api/csrf-token",
                "/health",
                "/health/ready",
                "/api/auth/login",
                "/api/auth/register",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            api_keys: Vec::new(),
            header_name: "x-csrf-token".to_string(),
            field_name: "_csrf".to_string(),
            session_cookie: "sid".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl CsrfConfig {
    pub fn with_api_keys(mut self, keys: Vec<String>) -> Self {
        self.api_keys = keys;
        self
    }

    pub fn with_exempt_path(mut self, path: impl Into<String>) -> Self {
        self.exempt_paths.push(path.into());
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(short) = self.api_keys.iter().find(|k| k.len() < 32) {
            return Err(format!(
                "API keys must be at least 32 characters (got {})",
                short.len()
            ));
        }
        if self.header_name.is_empty() || self.field_name.is_empty() {
            return Err("CSRF header and field names must not be empty".to_string());
        }
        if self.max_body_bytes == 0 {
            return Err("max_body_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// CSRF validation middleware
pub struct CsrfMiddleware {
    service: Arc<CsrfTokenService>,
    config: CsrfConfig,
    events: SecurityEventLogger,
    clock: Arc<dyn Clock>,
}

impl CsrfMiddleware {
    pub fn new(
        service: Arc<CsrfTokenService>,
        config: CsrfConfig,
        events: SecurityEventLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service,
            config,
            events,
            clock,
        }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    fn has_valid_api_key(&self, request: &Request) -> bool {
        let Some(presented) = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
        else {
            return false;
        };
        // Compare against every key so timing does not reveal the position.
        self.config
            .api_keys
            .iter()
            .fold(false, |found, key| constant_time_eq(key, presented) | found)
    }

    pub async fn layer(&self, request: Request, next: Next) -> Response {
        if is_safe_method(request.method())
            || self.config.is_exempt(request.uri().path())
            || self.has_valid_api_key(&request)
        {
            return next.run(request).await;
        }

        match self.check(request).await {
            Ok(request) => next.run(request).await,
            Err(e) => e.into_response(),
        }
    }

    async fn check(&self, request: Request) -> Result<Request, ApiError> {
        let Some(session) = client_identity::session_id(&request, &self.config.session_cookie) else {
            self.report(&request, "no_session", None);
            return Err(ApiError::forbidden(
                ErrorCode::CsrfNoSession,
                "No session found for CSRF validation",
            ));
        };

        let (request, token) = self.extract_token(request).await?;
        let Some(token) = token else {
            self.report(&request, "token_missing", Some(session.fingerprint()));
            return Err(ApiError::forbidden(
                ErrorCode::CsrfTokenMissing,
                "CSRF token missing",
            ));
        };

        if !self.service.validate(&session, &token).await? {
            self.report(&request, "token_invalid", Some(session.fingerprint()));
            return Err(ApiError::forbidden(
                ErrorCode::CsrfTokenInvalid,
                "Invalid or expired CSRF token",
            ));
        }

        Ok(request)
    }

    /// Token from the header, else the body field, else the query field.
    async fn extract_token(&self, request: Request) -> Result<(Request, Option<String>), ApiError> {
        if let Some(token) = request
            .headers()
            .get(self.config.header_name.as_str())
            .and_then(|h| h.to_str().ok())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_string();
            return Ok((request, Some(token)));
        }

        let (request, from_body) = if is_json(request.headers()) || is_form(request.headers()) {
            let json = is_json(request.headers());
            let (request, bytes) = take_body(request, self.config.max_body_bytes).await?;
            let token = if json {
                serde_json::from_slice::<Value>(&bytes).ok().and_then(|v| {
                    v.get(&self.config.field_name)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
            } else {
                self.field_from_pairs(&bytes)
            };
            (request, token)
        } else {
            (request, None)
        };

        let token = from_body.or_else(|| {
            request
                .uri()
                .query()
                .and_then(|q| self.field_from_pairs(q.as_bytes()))
        });
        Ok((request, token.filter(|t| !t.is_empty())))
    }

    fn field_from_pairs(&self, input: &[u8]) -> Option<String> {
        decode_pairs(input)
            .into_iter()
            .find(|(k, _)| *k == self.config.field_name)
            .map(|(_, v)| v)
    }

    fn report(&self, request: &Request, reason: &str, session: Option<String>) {
        let path = request.uri().path().to_string();
        let key = client_identity::client_key(request);
        warn!(key = %key, path = %path, reason, "CSRF validation failed");
        self.events.emit(
            SecurityEvent::new(
                SecurityEventType::CsrfValidationFailed,
                Severity::Medium,
                self.clock.now(),
            )
            .with_actor(key.to_string())
            .with_ip_address(client_identity::client_ip(request))
            .with_path(path)
            .with_details(json!({
                "reason": reason,
                "method": request.method().as_str(),
                "session": session,
            })),
        );
    }
}

/// Axum entry point for the CSRF layer.
pub async fn csrf_middleware(
    State(middleware): State<Arc<CsrfMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    middleware.layer(request, next).await
}
