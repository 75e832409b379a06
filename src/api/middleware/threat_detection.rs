use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::api::errors::{ApiError, ErrorCode};
use crate::api::middleware::client_identity;
use crate::api::middleware::payload::{decode_pairs, OriginalPayload};
use crate::application::ports::Clock;
use crate::application::security_events::SecurityEventLogger;
use crate::domain::entities::{SecurityEvent, SecurityEventType, Severity};
use crate::domain::value_objects::{ThreatAssessment, ThreatIndicator, MAX_RISK_SCORE};

const BLOCKED_MESSAGE: &str = "Request blocked due to suspicious activity";

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid threat pattern"))
        .collect()
}

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        // Quote breaking out of a literal into a condition or terminator.
        r"(?i)'\s*(or|and)\s+[\w']+\s*(=|like\b)",
        r"'\s*;",
        r"'\s*--",
        // Comment and terminator sequences.
        r"--\s*$",
        r"(?s)/\*.*?\*/",
        r"(?i);\s*(drop|delete|insert|update|select|exec|shutdown)\b",
        r"(?i)%27|%23|%3b",
        // Keywords as whole words.
        r"(?i)\b(union|select|insert|delete|update|drop|exec|script)\b",
    ])
});

static XSS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)<\s*/?\s*script\b",
        r"(?i)javascript\s*:",
        r"(?i)\bon[a-z]+\s*=",
        r"(?i)<\s*(iframe|object|embed|svg|img)\b[^>]*\s(src|on[a-z]+)\s*=",
    ])
});

static AGENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)bot|crawler|spider|scanner|curl|wget",
        r"(?i)sqlmap|nikto|nmap|masscan|acunetix|nessus|dirbuster|gobuster|zgrab",
    ])
});

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// Threat detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatDetectionConfig {
    /// Requests scoring at or above this are rejected
    pub block_threshold: u32,
    /// Paths that are never scored
    pub allow_paths: Vec<String>,
    /// Score the User-Agent header
    pub scan_user_agent: bool,
}

impl Default for ThreatDetectionConfig {
    fn default() -> Self {
        Self {
            block_threshold: 50,
            allow_paths: vec!["/health".to_string(), "/health/ready".to_string()],
            scan_user_agent: true,
        }
    }
}

impl ThreatDetectionConfig {
    pub fn production() -> Self {
        Self::default()
    }

    pub fn development() -> Self {
        Self::default()
    }

    pub fn with_block_threshold(mut self, threshold: u32) -> Self {
        self.block_threshold = threshold;
        self
    }

    pub fn with_allow_path(mut self, path: impl Into<String>) -> Self {
        self.allow_paths.push(path.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.block_threshold == 0 || self.block_threshold > MAX_RISK_SCORE {
            return Err(format!(
                "block_threshold must be between 1 and {}",
                MAX_RISK_SCORE
            ));
        }
        Ok(())
    }
}

/// Regex scorer for injection signatures.
#[derive(Debug, Clone, Default)]
pub struct ThreatDetector {
    config: ThreatDetectionConfig,
}

impl ThreatDetector {
    pub fn new(config: ThreatDetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThreatDetectionConfig {
        &self.config
    }

    pub fn is_allowed_path(&self, path: &str) -> bool {
        self.config.allow_paths.iter().any(|p| p == path)
    }

    pub fn assess(&self, text: &str, user_agent: Option<&str>) -> ThreatAssessment {
        let mut assessment = ThreatAssessment::new();

        if any_match(&SQL_PATTERNS, text) {
            assessment.record(ThreatIndicator::SqlInjection);
        }
        if any_match(&XSS_PATTERNS, text) {
            assessment.record(ThreatIndicator::Xss);
        }
        if self.config.scan_user_agent {
            if let Some(agent) = user_agent {
                if any_match(&AGENT_PATTERNS, agent) {
                    assessment.record(ThreatIndicator::SuspiciousAgent);
                }
            }
        }

        assessment
    }

    pub fn should_block(&self, assessment: &ThreatAssessment) -> bool {
        assessment.should_block(self.config.block_threshold)
    }
}

/// Text the client sent: the pre-sanitization snapshot when one exists,
/// otherwise the decoded query string.
fn scan_text(request: &Request) -> String {
    if let Some(original) = request.extensions().get::<OriginalPayload>() {
        return original.scan_text();
    }
    request
        .uri()
        .query()
        .map(|q| {
            decode_pairs(q.as_bytes())
                .into_iter()
                .flat_map(|(k, v)| [k, v])
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Threat detection middleware
pub struct ThreatDetectionMiddleware {
    detector: ThreatDetector,
    events: SecurityEventLogger,
    clock: Arc<dyn Clock>,
}

impl ThreatDetectionMiddleware {
    pub fn new(detector: ThreatDetector, events: SecurityEventLogger, clock: Arc<dyn Clock>) -> Self {
        Self {
            detector,
            events,
            clock,
        }
    }

    pub fn detector(&self) -> &ThreatDetector {
        &self.detector
    }

    pub async fn layer(&self, mut request: Request, next: Next) -> Response {
        let path = request.uri().path().to_string();
        if self.detector.is_allowed_path(&path) {
            return next.run(request).await;
        }

        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let assessment = self.detector.assess(&scan_text(&request), user_agent.as_deref());

        if !assessment.is_clean() {
            let key = client_identity::client_key(&request);
            let indicators: Vec<&str> = assessment.indicators().iter().map(|i| i.as_str()).collect();
            warn!(
                key = %key,
                path = %path,
                risk_score = assessment.risk_score(),
                indicators = ?indicators,
                "Suspicious request detected"
            );
            self.events.emit(
                SecurityEvent::new(
                    SecurityEventType::SuspiciousRequest,
                    if self.detector.should_block(&assessment) {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    self.clock.now(),
                )
                .with_actor(key.to_string())
                .with_ip_address(client_identity::client_ip(&request))
                .with_path(path.clone())
                .with_details(json!({
                    "riskScore": assessment.risk_score(),
                    "indicators": indicators,
                    "method": request.method().as_str(),
                    "userAgent": user_agent,
                })),
            );

            if self.detector.should_block(&assessment) {
                return ApiError::forbidden(ErrorCode::RequestBlocked, BLOCKED_MESSAGE).into_response();
            }
        }

        request.extensions_mut().insert(assessment);
        next.run(request).await
    }
}

/// Axum entry point for the threat detection layer.
pub async fn threat_detection_middleware(
    State(middleware): State<Arc<ThreatDetectionMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    middleware.layer(request, next).await
}
