//! Post-completion audit hook.
//!
//! Runs after the business handler has produced its response and turns
//! authentication and authorization outcomes into security events.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::api::middleware::client_identity;
use crate::application::ports::Clock;
use crate::application::security_events::SecurityEventLogger;
use crate::domain::entities::{SecurityEvent, SecurityEventType, Severity};

/// Audit hook configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether the hook reports anything at all
    pub enabled: bool,
    /// Paths never reported
    pub exclude_paths: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude_paths: vec!["/health".to_string(), "/health/ready".to_string()],
        }
    }
}

impl AuditConfig {
    pub fn should_audit(&self, path: &str) -> bool {
        self.enabled && !self.exclude_paths.iter().any(|p| p == path)
    }
}

/// Security event type for a completed response, if it warrants one.
pub fn classify_status(status: StatusCode) -> Option<(SecurityEventType, Severity)> {
    match status {
        StatusCode::UNAUTHORIZED => Some((SecurityEventType::AuthenticationFailed, Severity::Medium)),
        StatusCode::FORBIDDEN => Some((SecurityEventType::AccessDenied, Severity::Medium)),
        _ => None,
    }
}

#[derive(Clone)]
pub struct AuditMiddleware {
    events: SecurityEventLogger,
    clock: Arc<dyn Clock>,
    config: AuditConfig,
}

impl AuditMiddleware {
    pub fn new(events: SecurityEventLogger, clock: Arc<dyn Clock>, config: AuditConfig) -> Self {
        Self {
            events,
            clock,
            config,
        }
    }

    pub async fn layer(&self, request: Request, next: Next) -> Response {
        let path = request.uri().path().to_string();
        if !self.config.should_audit(&path) {
            return next.run(request).await;
        }

        let start = Instant::now();
        let method = request.method().clone();
        let key = client_identity::client_key(&request);
        let ip_address = client_identity::client_ip(&request);
        let user_agent = request
            .headers()
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let response = next.run(request).await;

        if let Some((event_type, severity)) = classify_status(response.status()) {
            self.events.emit(
                SecurityEvent::new(event_type, severity, self.clock.now())
                    .with_actor(key.to_string())
                    .with_ip_address(ip_address)
                    .with_path(path)
                    .with_details(json!({
                        "method": method.as_str(),
                        "status": response.status().as_u16(),
                        "userAgent": user_agent,
                        "durationMs": start.elapsed().as_millis() as u64,
                    })),
            );
        }

        response
    }
}

pub async fn audit_middleware(
    State(middleware): State<Arc<AuditMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    middleware.layer(request, next).await
}
