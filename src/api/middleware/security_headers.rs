//! Security headers middleware implementation

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::security_config::SecurityHeadersConfig;

/// Adds the configured security headers to every response.
///
/// Values are parsed once at construction so a bad configuration fails
/// at startup instead of on a request.
#[derive(Debug, Clone)]
pub struct SecurityHeadersMiddleware {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl SecurityHeadersMiddleware {
    pub fn new(config: &SecurityHeadersConfig) -> Result<Self, String> {
        config.validate()?;

        let mut raw: Vec<(HeaderName, String)> = vec![(
            header::CONTENT_SECURITY_POLICY,
            config.content_security_policy(),
        )];
        if let Some(hsts) = config.hsts_value() {
            raw.push((header::STRICT_TRANSPORT_SECURITY, hsts));
        }
        let optional = [
            (header::X_FRAME_OPTIONS, &config.x_frame_options),
            (header::X_CONTENT_TYPE_OPTIONS, &config.x_content_type_options),
            (header::X_XSS_PROTECTION, &config.x_xss_protection),
            (header::REFERRER_POLICY, &config.referrer_policy),
            (
                HeaderName::from_static("permissions-policy"),
                &config.permissions_policy,
            ),
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                &config.cross_origin_opener_policy,
            ),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                raw.push((name, value.clone()));
            }
        }

        let headers = raw
            .into_iter()
            .map(|(name, value)| {
                HeaderValue::from_str(&value)
                    .map(|v| (name.clone(), v))
                    .map_err(|_| format!("Invalid value for header {}: {}", name, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            headers: Arc::new(headers),
        })
    }

    pub fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();
        for (name, value) in self.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
    }

    pub async fn layer(&self, request: Request, next: Next) -> Response {
        let mut response = next.run(request).await;
        self.apply(&mut response);
        response
    }
}

/// Axum entry point for the security headers layer.
pub async fn security_headers_middleware(
    State(middleware): State<Arc<SecurityHeadersMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    middleware.layer(request, next).await
}
