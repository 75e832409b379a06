use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::errors::ApiError;
use crate::api::middleware::client_identity;
use crate::application::ports::{Clock, RateLimitStore};
use crate::application::security_events::SecurityEventLogger;
use crate::domain::entities::{retry_after_secs, SecurityEvent, SecurityEventType, Severity};
use crate::domain::errors::StoreError;
use crate::domain::value_objects::ClientKey;

const FIFTEEN_MINUTES_MS: u64 = 15 * 60 * 1000;

/// Limiter classes, each with its own counter scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterKind {
    Api,
    Auth,
    AuthFailures,
    Payments,
}

impl LimiterKind {
    pub fn scope(self) -> &'static str {
        match self {
            LimiterKind::Api => "api",
            LimiterKind::Auth => "auth",
            LimiterKind::AuthFailures => "auth_failures",
            LimiterKind::Payments => "payments",
        }
    }

    fn message(self) -> &'static str {
        match self {
            LimiterKind::Api => "Too many requests, please try again later",
            LimiterKind::Auth => "Too many authentication attempts, please try again later",
            LimiterKind::AuthFailures => "Too many failed login attempts, please try again later",
            LimiterKind::Payments => "Too many payment requests, please try again later",
        }
    }
}

impl std::fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scope())
    }
}

/// One limiter's window and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl LimitRule {
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    pub fn window(&self) -> TimeDelta {
        TimeDelta::milliseconds(i64::try_from(self.window_ms).unwrap_or(i64::MAX))
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// General API traffic
    pub api: LimitRule,
    /// Authentication endpoints
    pub auth: LimitRule,
    /// Failed (401) authentication responses
    pub auth_failures: LimitRule,
    /// Payment endpoints
    pub payments: LimitRule,
    pub api_prefix: String,
    pub auth_prefix: String,
    pub payments_prefix: String,
    /// Paths never rate limited
    pub exempt_paths: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl RateLimitConfig {
    pub fn production() -> Self {
        Self {
            api: LimitRule::new(FIFTEEN_MINUTES_MS, 100),
            auth: LimitRule::new(FIFTEEN_MINUTES_MS, 5),
            auth_failures: LimitRule::new(FIFTEEN_MINUTES_MS, 3),
            payments: LimitRule::new(60 * 1000, 3),
            api_prefix: "/api".to_string(),
            auth_prefix: "/api/auth".to_string(),
            payments_prefix: "/api/payments".to_string(),
            exempt_paths: vec!["/health".to_string(), "/health/ready".to_string()],
        }
    }

    pub fn development() -> Self {
        Self {
            api: LimitRule::new(FIFTEEN_MINUTES_MS, 1000),
            ..Self::production()
        }
    }

    pub fn with_api_limit(mut self, window_ms: u64, max_requests: u32) -> Self {
        self.api = LimitRule::new(window_ms, max_requests);
        self
    }

    pub fn with_exempt_path(mut self, path: impl Into<String>) -> Self {
        self.exempt_paths.push(path.into());
        self
    }

    pub fn rule(&self, kind: LimiterKind) -> LimitRule {
        match kind {
            LimiterKind::Api => self.api,
            LimiterKind::Auth => self.auth,
            LimiterKind::AuthFailures => self.auth_failures,
            LimiterKind::Payments => self.payments,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for kind in [
            LimiterKind::Api,
            LimiterKind::Auth,
            LimiterKind::AuthFailures,
            LimiterKind::Payments,
        ] {
            let rule = self.rule(kind);
            if rule.window_ms == 0 {
                return Err(format!("Rate limit window for {} must be greater than 0", kind));
            }
            if rule.max_requests == 0 {
                return Err(format!("Rate limit max for {} must be greater than 0", kind));
            }
        }
        Ok(())
    }
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Outcome of checking one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Path is not subject to any limiter.
    Exempt,
    /// Allowed; `remaining` is for the tightest limiter that applied.
    Allow { limit: u32, remaining: u32 },
    Reject {
        limiter: LimiterKind,
        retry_after_secs: u64,
    },
}

/// Fixed-window limiter over a [`RateLimitStore`].
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.config.exempt_paths.iter().any(|p| p == path)
    }

    pub fn is_auth_path(&self, path: &str) -> bool {
        under_prefix(path, &self.config.auth_prefix)
    }

    /// Limiters a path is counted against, most specific first.
    pub fn classify(&self, path: &str) -> Vec<LimiterKind> {
        if self.is_exempt(path) || !under_prefix(path, &self.config.api_prefix) {
            return Vec::new();
        }
        if self.is_auth_path(path) {
            vec![LimiterKind::Auth, LimiterKind::Api]
        } else if under_prefix(path, &self.config.payments_prefix) {
            vec![LimiterKind::Payments, LimiterKind::Api]
        } else {
            vec![LimiterKind::Api]
        }
    }

    /// Count one request against a single limiter.
    pub async fn check(&self, kind: LimiterKind, key: &ClientKey) -> Result<RateDecision, StoreError> {
        let rule = self.config.rule(kind);
        let now = self.clock.now();
        let window = self.store.hit(kind.scope(), key, rule.window(), now).await?;

        if window.count > rule.max_requests {
            return Ok(RateDecision::Reject {
                limiter: kind,
                retry_after_secs: retry_after_secs(window.remaining(rule.window(), now)),
            });
        }
        Ok(RateDecision::Allow {
            limit: rule.max_requests,
            remaining: rule.max_requests - window.count,
        })
    }

    pub async fn check_request(&self, path: &str, key: &ClientKey) -> Result<RateDecision, StoreError> {
        let kinds = self.classify(path);
        if kinds.is_empty() {
            return Ok(RateDecision::Exempt);
        }

        if self.is_auth_path(path) {
            let rule = self.config.auth_failures;
            let now = self.clock.now();
            let failures = self
                .store
                .peek(LimiterKind::AuthFailures.scope(), key, rule.window(), now)
                .await?;
            if failures.count >= rule.max_requests {
                return Ok(RateDecision::Reject {
                    limiter: LimiterKind::AuthFailures,
                    retry_after_secs: retry_after_secs(failures.remaining(rule.window(), now)),
                });
            }
        }

        let mut tightest: Option<(u32, u32)> = None;
        for kind in kinds {
            match self.check(kind, key).await? {
                RateDecision::Allow { limit, remaining } => {
                    if tightest.is_none_or(|(_, r)| remaining < r) {
                        tightest = Some((limit, remaining));
                    }
                }
                reject => return Ok(reject),
            }
        }

        Ok(tightest
            .map(|(limit, remaining)| RateDecision::Allow { limit, remaining })
            .unwrap_or(RateDecision::Exempt))
    }

    /// Count a failed authentication response.
    pub async fn record_auth_failure(&self, key: &ClientKey) -> Result<(), StoreError> {
        let rule = self.config.auth_failures;
        self.store
            .hit(
                LimiterKind::AuthFailures.scope(),
                key,
                rule.window(),
                self.clock.now(),
            )
            .await?;
        Ok(())
    }
}

/// Rate limiting middleware
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
    events: SecurityEventLogger,
}

impl RateLimitMiddleware {
    pub fn new(limiter: RateLimiter, events: SecurityEventLogger) -> Self {
        Self { limiter, events }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn layer(&self, request: Request, next: Next) -> Response {
        let path = request.uri().path().to_string();
        if self.limiter.is_exempt(&path) {
            return next.run(request).await;
        }

        let key = client_identity::client_key(&request);
        let decision = match self.limiter.check_request(&path, &key).await {
            Ok(decision) => decision,
            Err(e) => return ApiError::from(e).into_response(),
        };

        match decision {
            RateDecision::Reject {
                limiter,
                retry_after_secs,
            } => {
                warn!(key = %key, path = %path, limiter = %limiter, retry_after_secs, "Rate limit exceeded");
                self.events.emit(
                    SecurityEvent::new(
                        SecurityEventType::RateLimitExceeded,
                        Severity::Medium,
                        self.limiter.clock.now(),
                    )
                    .with_actor(key.to_string())
                    .with_ip_address(client_identity::client_ip(&request))
                    .with_path(path.clone())
                    .with_details(json!({
                        "limiter": limiter.scope(),
                        "retryAfter": retry_after_secs,
                    })),
                );
                ApiError::rate_limited(limiter.message(), retry_after_secs).into_response()
            }
            RateDecision::Exempt => next.run(request).await,
            RateDecision::Allow { limit, remaining } => {
                let is_auth = self.limiter.is_auth_path(&path);
                let mut response = next.run(request).await;

                if is_auth && response.status() == StatusCode::UNAUTHORIZED {
                    if let Err(e) = self.limiter.record_auth_failure(&key).await {
                        error!(key = %key, error = %e, "Failed to record authentication failure");
                    }
                }

                let headers = response.headers_mut();
                headers.insert(
                    HeaderName::from_static("ratelimit-limit"),
                    HeaderValue::from(limit),
                );
                headers.insert(
                    HeaderName::from_static("ratelimit-remaining"),
                    HeaderValue::from(remaining),
                );
                response
            }
        }
    }
}

/// Axum entry point for the rate limiting layer.
pub async fn rate_limit_middleware(
    State(middleware): State<Arc<RateLimitMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    middleware.layer(request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockRateLimitStore, MockSecurityEventSink};
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::memory::InMemoryRateLimitStore;
    use axum::{
        body::{to_bytes, Body},
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn limiter(clock: Arc<ManualClock>, config: RateLimitConfig) -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryRateLimitStore::new()), clock, config)
    }

    fn events() -> SecurityEventLogger {
        let mut sink = MockSecurityEventSink::new();
        sink.expect_record().returning(|_| Ok(()));
        SecurityEventLogger::new(Arc::new(sink))
    }

    fn ip(addr: &str) -> ClientKey {
        ClientKey::ip(addr)
    }

    #[tokio::test]
    async fn test_api_limit_rejects_request_over_ceiling() {
        let limiter = limiter(clock(), RateLimitConfig::production());
        let key = ip("203.0.113.1");

        for i in 0..100 {
            let decision = limiter.check_request("/api/donors", &key).await.unwrap();
            assert!(
                matches!(decision, RateDecision::Allow { remaining, .. } if remaining == 99 - i),
                "request {} should be allowed",
                i + 1
            );
        }

        match limiter.check_request("/api/donors", &key).await.unwrap() {
            RateDecision::Reject {
                limiter,
                retry_after_secs,
            } => {
                assert_eq!(limiter, LimiterKind::Api);
                assert!(retry_after_secs > 0 && retry_after_secs <= 900);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_reset_restores_budget() {
        let clock = clock();
        let limiter = limiter(clock.clone(), RateLimitConfig::production());
        let key = ip("203.0.113.2");

        for _ in 0..3 {
            limiter.check_request("/api/payments/charge", &key).await.unwrap();
        }
        assert!(matches!(
            limiter.check_request("/api/payments/charge", &key).await.unwrap(),
            RateDecision::Reject {
                limiter: LimiterKind::Payments,
                ..
            }
        ));

        clock.advance(TimeDelta::seconds(60));
        assert!(matches!(
            limiter.check_request("/api/payments/charge", &key).await.unwrap(),
            RateDecision::Allow { .. }
        ));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = limiter(clock(), RateLimitConfig::production());
        for _ in 0..5 {
            limiter.check_request("/api/auth/login", &ip("198.51.100.1")).await.unwrap();
        }
        assert!(matches!(
            limiter.check_request("/api/auth/login", &ip("198.51.100.1")).await.unwrap(),
            RateDecision::Reject { limiter: LimiterKind::Auth, .. }
        ));
        assert!(matches!(
            limiter.check_request("/api/auth/login", &ip("198.51.100.2")).await.unwrap(),
            RateDecision::Allow { .. }
        ));
    }

    #[tokio::test]
    async fn test_classification() {
        let limiter = limiter(clock(), RateLimitConfig::production());
        assert_eq!(
            limiter.classify("/api/auth/login"),
            vec![LimiterKind::Auth, LimiterKind::Api]
        );
        assert_eq!(
            limiter.classify("/api/payments"),
            vec![LimiterKind::Payments, LimiterKind::Api]
        );
        assert_eq!(limiter.classify("/api/donors/7"), vec![LimiterKind::Api]);
        assert!(limiter.classify("/api-docs/openapi.json").is_empty());
        assert!(limiter.classify("/health").is_empty());
        assert!(limiter.classify("/api/authority").contains(&LimiterKind::Api));
        assert!(!limiter.classify("/api/authority").contains(&LimiterKind::Auth));
    }

    #[tokio::test]
    async fn test_failed_auth_blocks_after_three_failures() {
        let limiter = limiter(clock(), RateLimitConfig::development());
        let key = ip("192.0.2.10");

        for _ in 0..3 {
            limiter.record_auth_failure(&key).await.unwrap();
        }
        assert!(matches!(
            limiter.check_request("/api/auth/login", &key).await.unwrap(),
            RateDecision::Reject {
                limiter: LimiterKind::AuthFailures,
                ..
            }
        ));
        // Non-auth routes are unaffected.
        assert!(matches!(
            limiter.check_request("/api/donors", &key).await.unwrap(),
            RateDecision::Allow { .. }
        ));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockRateLimitStore::new();
        store
            .expect_hit()
            .returning(|_, _, _, _| Err(StoreError::Unavailable("down".into())));
        let limiter = RateLimiter::new(Arc::new(store), clock(), RateLimitConfig::production());
        assert!(limiter.check_request("/api/donors", &ip("10.0.0.1")).await.is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(RateLimitConfig::production().validate().is_ok());
        assert!(RateLimitConfig::production()
            .with_api_limit(0, 10)
            .validate()
            .is_err());
        assert!(RateLimitConfig::production()
            .with_api_limit(1000, 0)
            .validate()
            .is_err());
        assert_eq!(RateLimitConfig::development().api.max_requests, 1000);
    }

    fn app(clock: Arc<ManualClock>, config: RateLimitConfig) -> Router {
        let middleware = Arc::new(RateLimitMiddleware::new(limiter(clock, config), events()));
        Router::new()
            .route("/api/donors", get(|| async { "ok" }))
            .route("/health", get(|| async { "ok" }))
            .route(
                "/api/auth/login",
                post(|| async { StatusCode::UNAUTHORIZED }),
            )
            .layer(from_fn_with_state(middleware, rate_limit_middleware))
    }

    fn get_req(uri: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_middleware_returns_429_with_retry_after() {
        let app = app(clock(), RateLimitConfig::production().with_api_limit(60_000, 2));

        for _ in 0..2 {
            let response = app.clone().oneshot(get_req("/api/donors")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key("ratelimit-remaining"));
        }

        let response = app.clone().oneshot(get_req("/api/donors")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(json["retryAfter"], 60);
    }

    #[tokio::test]
    async fn test_exempt_paths_bypass() {
        let app = app(clock(), RateLimitConfig::production().with_api_limit(60_000, 1));
        for _ in 0..5 {
            let response = app.clone().oneshot(get_req("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response.headers().contains_key("ratelimit-limit"));
        }
    }

    #[tokio::test]
    async fn test_unauthorized_responses_feed_failure_limiter() {
        let app = app(clock(), RateLimitConfig::production());
        let login = || {
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("x-forwarded-for", "203.0.113.77")
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..3 {
            let response = app.clone().oneshot(login()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let response = app.clone().oneshot(login()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
