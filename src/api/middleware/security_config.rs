//! Security headers configuration
//!
//! Configuration and validation for the response headers every reply
//! carries, pipeline rejections included.

use serde::{Deserialize, Serialize};

/// Security headers configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    /// Backend origin (API and realtime) added to `connect-src`
    pub backend_origin: Option<String>,
    /// Extra directives appended to the generated policy
    pub extra_csp_directives: Vec<String>,
    /// Strict Transport Security max age in seconds
    pub hsts_max_age: Option<u64>,
    /// Include subdomains in HSTS
    pub hsts_include_subdomains: bool,
    /// Request HSTS preload list inclusion
    pub hsts_preload: bool,
    /// X-Frame-Options value
    pub x_frame_options: Option<String>,
    /// X-Content-Type-Options
    pub x_content_type_options: Option<String>,
    /// X-XSS-Protection for legacy browsers
    pub x_xss_protection: Option<String>,
    /// Referrer-Policy
    pub referrer_policy: Option<String>,
    /// Permissions-Policy (formerly Feature-Policy)
    pub permissions_policy: Option<String>,
    /// Cross-Origin-Opener-Policy
    pub cross_origin_opener_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            backend_origin: None,
            extra_csp_directives: Vec::new(),
            hsts_max_age: Some(31536000), // 1 year
            hsts_include_subdomains: true,
            hsts_preload: true,
            x_frame_options: Some("DENY".to_string()),
            x_content_type_options: Some("nosniff".to_string()),
            x_xss_protection: Some("1; mode=block".to_string()),
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            permissions_policy: Some(
                "camera=(), microphone=(), geolocation=(), payment=(), interest-cohort=()"
                    .to_string(),
            ),
            cross_origin_opener_policy: Some("same-origin".to_string()),
        }
    }
}

impl SecurityHeadersConfig {
    /// Create a secure production configuration
    pub fn production() -> Self {
        Self::default()
    }

    /// Development keeps the policy but skips HSTS on plain-HTTP localhost.
    pub fn development() -> Self {
        Self {
            hsts_max_age: None,
            hsts_include_subdomains: false,
            hsts_preload: false,
            ..Self::default()
        }
    }

    pub fn with_backend_origin(mut self, origin: impl Into<String>) -> Self {
        self.backend_origin = Some(origin.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_csp_directive(mut self, directive: impl Into<String>) -> Self {
        self.extra_csp_directives.push(directive.into());
        self
    }

    /// Content-Security-Policy built from the configured origins.
    pub fn content_security_policy(&self) -> String {
        let mut connect_src = vec!["'self'".to_string()];
        if let Some(origin) = &self.backend_origin {
            connect_src.push(origin.clone());
            if let Some(host) = origin
                .strip_prefix("https://")
                .or_else(|| origin.strip_prefix("http://"))
            {
                connect_src.push(format!("wss://{}", host));
            }
        }

        let mut directives = vec![
            "default-src 'self'".to_string(),
            "script-src 'self'".to_string(),
            "style-src 'self' 'unsafe-inline' https://fonts.googleapis.com".to_string(),
            "font-src 'self' https://fonts.gstatic.com".to_string(),
            "img-src 'self' data: https:".to_string(),
            format!("connect-src {}", connect_src.join(" ")),
            "frame-ancestors 'none'".to_string(),
            "object-src 'none'".to_string(),
            "base-uri 'self'".to_string(),
            "form-action 'self'".to_string(),
        ];
        directives.extend(self.extra_csp_directives.iter().cloned());
        directives.join("; ")
    }

    pub fn hsts_value(&self) -> Option<String> {
        self.hsts_max_age.map(|max_age| {
            let mut value = format!("max-age={}", max_age);
            if self.hsts_include_subdomains {
                value.push_str("; includeSubDomains");
            }
            if self.hsts_preload {
                value.push_str("; preload");
            }
            value
        })
    }

    /// Validate the security headers configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(origin) = &self.backend_origin {
            if !(origin.starts_with("https://") || origin.starts_with("http://")) {
                return Err(format!("Backend origin must be an http(s) URL: {}", origin));
            }
        }

        if let Some(max_age) = self.hsts_max_age {
            if max_age == 0 {
                return Err("HSTS max-age must be greater than 0".to_string());
            }
            if max_age > 2147483647 {
                return Err("HSTS max-age is too large (maximum 2147483647)".to_string());
            }
            if self.hsts_preload && (max_age < 31536000 || !self.hsts_include_subdomains) {
                return Err(
                    "HSTS preload requires max-age of at least one year and includeSubDomains"
                        .to_string(),
                );
            }
        }

        if let Some(xfo) = &self.x_frame_options {
            let valid_values = ["DENY", "SAMEORIGIN"];
            if !valid_values.contains(&xfo.to_uppercase().as_str()) {
                return Err(format!(
                    "Invalid X-Frame-Options value: {}. Valid values are: {}",
                    xfo,
                    valid_values.join(", ")
                ));
            }
        }

        if let Some(rp) = &self.referrer_policy {
            let valid_policies = [
                "no-referrer",
                "no-referrer-when-downgrade",
                "origin",
                "origin-when-cross-origin",
                "same-origin",
                "strict-origin",
                "strict-origin-when-cross-origin",
                "unsafe-url",
            ];
            if !valid_policies.contains(&rp.as_str()) {
                return Err(format!("Invalid Referrer-Policy value: {}", rp));
            }
        }

        Ok(())
    }
}
