use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of security-relevant occurrences the pipeline reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    CsrfTokenIssued,
    CsrfValidationFailed,
    RateLimitExceeded,
    XssAttemptDetected,
    SuspiciousRequest,
    AuthenticationFailed,
    AccessDenied,
}

impl SecurityEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityEventType::CsrfTokenIssued => "CSRF_TOKEN_ISSUED",
            SecurityEventType::CsrfValidationFailed => "CSRF_VALIDATION_FAILED",
            SecurityEventType::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            SecurityEventType::XssAttemptDetected => "XSS_ATTEMPT_DETECTED",
            SecurityEventType::SuspiciousRequest => "SUSPICIOUS_REQUEST",
            SecurityEventType::AuthenticationFailed => "AUTHENTICATION_FAILED",
            SecurityEventType::AccessDenied => "ACCESS_DENIED",
        }
    }
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single security event, handed to the configured sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub severity: Severity,
    /// Client key (`user:<id>` or `ip:<addr>`) when known.
    pub actor: Option<String>,
    pub ip_address: Option<String>,
    pub path: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, severity: Severity, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            severity,
            actor: None,
            ip_address: None,
            path: None,
            timestamp,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_value(SecurityEventType::XssAttemptDetected).unwrap(),
            json!("XSS_ATTEMPT_DETECTED")
        );
        assert_eq!(
            SecurityEventType::CsrfValidationFailed.to_string(),
            "CSRF_VALIDATION_FAILED"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
        assert_eq!(serde_json::to_value(Severity::High).unwrap(), json!("high"));
    }

    #[test]
    fn test_builder_fills_fields() {
        let event = SecurityEvent::new(
            SecurityEventType::RateLimitExceeded,
            Severity::Medium,
            Utc::now(),
        )
        .with_actor("ip:10.0.0.1")
        .with_path("/api/payments")
        .with_details(json!({ "limiter": "payments" }));

        assert_eq!(event.actor.as_deref(), Some("ip:10.0.0.1"));
        assert_eq!(event.path.as_deref(), Some("/api/payments"));
        assert_eq!(event.details["limiter"], "payments");
        assert!(event.ip_address.is_none());
    }
}
