//! Middleware configuration aggregation
//!
//! One structure holding the configuration of every pipeline stage, so the
//! whole pipeline can be built, validated and serialized as a unit.

use serde::{Deserialize, Serialize};

use super::{
    audit::AuditConfig, client_identity::IdentityConfig, cors::CorsConfig, csrf::CsrfConfig,
    input_sanitization::SanitizationConfig, rate_limiting::RateLimitConfig,
    security_config::SecurityHeadersConfig, threat_detection::ThreatDetectionConfig,
};

/// Unified middleware configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MiddlewareConfig {
    /// Trusted identity headers
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Security response headers
    pub security_headers: SecurityHeadersConfig,
    /// Cross-origin policy
    pub cors: CorsConfig,
    /// Rate limiting configuration
    pub rate_limiting: RateLimitConfig,
    /// Input sanitization configuration
    pub sanitization: SanitizationConfig,
    /// Threat scoring
    pub threat_detection: ThreatDetectionConfig,
    /// CSRF validation
    pub csrf: CsrfConfig,
    /// Post-completion audit hook
    pub audit: AuditConfig,
}

impl MiddlewareConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a production-ready configuration
    pub fn production(allowed_origins: Vec<String>) -> Self {
        Self {
            identity: IdentityConfig::default(),
            security_headers: SecurityHeadersConfig::production(),
            cors: CorsConfig::production(allowed_origins),
            rate_limiting: RateLimitConfig::production(),
            sanitization: SanitizationConfig::production(),
            threat_detection: ThreatDetectionConfig::production(),
            csrf: CsrfConfig::default(),
            audit: AuditConfig::default(),
        }
    }

    /// Create a development configuration with more permissive settings
    pub fn development() -> Self {
        Self {
            identity: IdentityConfig::default(),
            security_headers: SecurityHeadersConfig::development(),
            cors: CorsConfig::development(),
            rate_limiting: RateLimitConfig::development(),
            sanitization: SanitizationConfig::development(),
            threat_detection: ThreatDetectionConfig::development(),
            csrf: CsrfConfig::default(),
            audit: AuditConfig::default(),
        }
    }

    pub fn with_identity(mut self, config: IdentityConfig) -> Self {
        self.identity = config;
        self
    }

    pub fn with_rate_limiting(mut self, config: RateLimitConfig) -> Self {
        self.rate_limiting = config;
        self
    }

    pub fn with_security_headers(mut self, config: SecurityHeadersConfig) -> Self {
        self.security_headers = config;
        self
    }

    pub fn with_csrf(mut self, config: CsrfConfig) -> Self {
        self.csrf = config;
        self
    }

    pub fn with_sanitization(mut self, config: SanitizationConfig) -> Self {
        self.sanitization = config;
        self
    }

    pub fn with_threat_detection(mut self, config: ThreatDetectionConfig) -> Self {
        self.threat_detection = config;
        self
    }

    /// Validate every stage, prefixing errors with the stage name.
    pub fn validate(&self) -> Result<(), String> {
        self.security_headers
            .validate()
            .map_err(|e| format!("security_headers: {}", e))?;
        self.cors.validate().map_err(|e| format!("cors: {}", e))?;
        self.rate_limiting
            .validate()
            .map_err(|e| format!("rate_limiting: {}", e))?;
        self.sanitization
            .validate()
            .map_err(|e| format!("sanitization: {}", e))?;
        self.threat_detection
            .validate()
            .map_err(|e| format!("threat_detection: {}", e))?;
        self.csrf.validate().map_err(|e| format!("csrf: {}", e))?;
        Ok(())
    }
}
