//! End-to-end tests of the assembled security pipeline


use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::json;

use backoffice_shield::api::middleware::{IdentityConfig, MiddlewareConfig, RateLimitConfig};
use backoffice_shield::domain::entities::{SecurityEventType, Severity};
use test_fixtures::{body_json, body_text, get, post_json, TestPipeline, SESSION_COOKIE};

fn tight_api_limit(max_requests: u32) -> MiddlewareConfig {
    MiddlewareConfig::development()
        .with_rate_limiting(RateLimitConfig::development().with_api_limit(60_000, max_requests))
}

fn assert_security_headers(response: &axum::response::Response) {
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    assert!(headers["content-security-policy"]
        .to_str()
        .unwrap()
        .contains("default-src 'self'"));
}

#[tokio::test]
async fn test_security_headers_on_success() {
    let pipeline = TestPipeline::development();
    let response = pipeline.send(get("/api/donors")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_security_headers(&response);
    assert_eq!(response.headers()["ratelimit-limit"], "1000");
    assert_eq!(response.headers()["ratelimit-remaining"], "999");
}

#[tokio::test]
async fn test_security_headers_on_rejections() {
    let pipeline = TestPipeline::new(tight_api_limit(1));
    assert_eq!(pipeline.send(get("/api/donors")).await.status(), StatusCode::OK);

    let limited = pipeline.send(get("/api/donors")).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_security_headers(&limited);

    let pipeline = TestPipeline::development();
    let forbidden = pipeline
        .send(post_json("/api/donors", None, json!({ "name": "Ada" })))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    assert_security_headers(&forbidden);
}

#[tokio::test]
async fn test_cors_preflight_mirrors_origin() {
    let pipeline = TestPipeline::development();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/donors")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-csrf-token,content-type")
        .body(Body::empty())
        .unwrap();

    let response = pipeline.send(request).await;

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_rate_limit_rejects_with_retry_after() {
    let pipeline = TestPipeline::new(tight_api_limit(2));

    for _ in 0..2 {
        assert_eq!(pipeline.send(get("/api/donors")).await.status(), StatusCode::OK);
    }
    let response = pipeline.send(get("/api/donors")).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "60");
    let body = body_json(response).await;
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["retryAfter"], 60);

    let event = pipeline
        .sink
        .wait_for(SecurityEventType::RateLimitExceeded)
        .await
        .expect("rate limit event");
    assert_eq!(event.severity, Severity::Medium);
    assert_eq!(event.path.as_deref(), Some("/api/donors"));
}

#[tokio::test]
async fn test_rate_limit_window_resets() {
    let pipeline = TestPipeline::new(tight_api_limit(1));
    assert_eq!(pipeline.send(get("/api/donors")).await.status(), StatusCode::OK);
    assert_eq!(
        pipeline.send(get("/api/donors")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    pipeline.clock.advance(chrono::TimeDelta::seconds(61));
    assert_eq!(pipeline.send(get("/api/donors")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let pipeline = TestPipeline::new(tight_api_limit(1));
    let from = |ip: &str| {
        Request::builder()
            .uri("/api/donors")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(pipeline.send(from("203.0.113.7")).await.status(), StatusCode::OK);
    assert_eq!(
        pipeline.send(from("203.0.113.7")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(pipeline.send(from("198.51.100.2")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_exempt_from_rate_limiting() {
    let pipeline = TestPipeline::new(tight_api_limit(1));

    for _ in 0..5 {
        let response = pipeline.send(get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("ratelimit-limit").is_none());
    }

    let ready = body_json(pipeline.send(get("/health/ready")).await).await;
    assert_eq!(ready["status"], "ready");
    assert_eq!(ready["database"], "not_configured");
}

#[tokio::test]
async fn test_markup_is_stripped_from_json_bodies() {
    let pipeline = TestPipeline::development();
    let token = pipeline.issue_token().await;

    let response = pipeline
        .send(post_json(
            "/api/donors",
            Some(&token),
            json!({
                "name": "<b>Ada</b><img src=x onerror=alert(1)>",
                "amount": 25,
                "tags": ["<i>monthly</i>"]
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let echoed = body_json(response).await;
    assert_eq!(echoed["name"], "Ada");
    assert_eq!(echoed["amount"], 25);
    assert_eq!(echoed["tags"][0], "monthly");

    let event = pipeline
        .sink
        .wait_for(SecurityEventType::XssAttemptDetected)
        .await
        .expect("xss event");
    assert_eq!(event.severity, Severity::High);
    assert_eq!(event.details["method"], "POST");

    // A single indicator family stays below the blocking threshold.
    let suspicious = pipeline
        .sink
        .wait_for(SecurityEventType::SuspiciousRequest)
        .await
        .expect("suspicious request event");
    assert_eq!(suspicious.severity, Severity::Medium);
}

#[tokio::test]
async fn test_clean_requests_emit_no_events() {
    let pipeline = TestPipeline::development();
    let token = pipeline.issue_token().await;

    let response = pipeline
        .send(post_json(
            "/api/donors",
            Some(&token),
            json!({ "name": "Grace Hopper", "note": "Annual gala, table 4" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let events: Vec<_> = pipeline
        .sink
        .events()
        .into_iter()
        .filter(|e| e.event_type != SecurityEventType::CsrfTokenIssued)
        .collect();
    assert!(events.is_empty(), "unexpected events: {:?}", events);
}

#[tokio::test]
async fn test_high_risk_request_is_blocked() {
    let pipeline = TestPipeline::development();

    let response = pipeline
        .send(post_json(
            "/api/donors",
            None,
            json!({ "note": "<script>document.location='https://evil.example'</script>" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "REQUEST_BLOCKED");
    assert_eq!(body["error"], "Request blocked due to suspicious activity");

    let event = pipeline
        .sink
        .wait_for(SecurityEventType::SuspiciousRequest)
        .await
        .expect("suspicious request event");
    assert_eq!(event.severity, Severity::High);
    assert_eq!(event.details["riskScore"], 70);
}

#[tokio::test]
async fn test_plain_text_body_is_scored() {
    let pipeline = TestPipeline::development();
    let token = pipeline.issue_token().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/charge")
        .header("content-type", "text/plain")
        .header("cookie", SESSION_COOKIE)
        .header("x-csrf-token", token)
        .body(Body::from("<script>alert(1)</script>'; DROP TABLE users; --"))
        .unwrap();

    let response = pipeline.send(request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "REQUEST_BLOCKED");
}

#[tokio::test]
async fn test_untyped_body_is_scored() {
    let pipeline = TestPipeline::development();
    let token = pipeline.issue_token().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/donors")
        .header("cookie", SESSION_COOKIE)
        .header("x-csrf-token", token)
        .body(Body::from("<script>x</script>' UNION SELECT password FROM users --"))
        .unwrap();

    let response = pipeline.send(request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "REQUEST_BLOCKED");
}

#[tokio::test]
async fn test_injection_in_query_is_scored() {
    let pipeline = TestPipeline::development();
    let request = Request::builder()
        .uri("/api/donors?name=x%27%20OR%20%271%27%3D%271&sort=%3Cscript%3E")
        .body(Body::empty())
        .unwrap();

    let response = pipeline.send(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sanitized_path_is_the_one_routed() {
    let pipeline = TestPipeline::development();

    let response = pipeline
        .send(get("/api/donors/%3Cb%3EAda%3C%2Fb%3E"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Ada");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let pipeline = TestPipeline::development();
    let token = pipeline.issue_token().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/donors")
        .header("content-type", "application/json")
        .header("cookie", test_fixtures::SESSION_COOKIE)
        .header("x-csrf-token", token)
        .body(Body::from("{\"name\": "))
        .unwrap();

    let response = pipeline.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_JSON");
}

#[tokio::test]
async fn test_forbidden_business_response_is_audited() {
    let pipeline = TestPipeline::new(
        MiddlewareConfig::development()
            .with_identity(IdentityConfig::default().with_trusted_user_id_header(true)),
    );

    let response = pipeline
        .send(
            Request::builder()
                .uri("/api/admin/settings")
                .header("x-user-id", "staff-17")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let event = pipeline
        .sink
        .wait_for(SecurityEventType::AccessDenied)
        .await
        .expect("access denied event");
    assert_eq!(event.path.as_deref(), Some("/api/admin/settings"));
    assert_eq!(event.actor.as_deref(), Some("user:staff-17"));
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let pipeline = TestPipeline::development();

    let response = pipeline
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "trace-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "trace-42");

    let response = pipeline.send(get("/health")).await;
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn test_openapi_document_lists_pipeline_endpoints() {
    let pipeline = TestPipeline::development();

    let response = pipeline.send(get("/api-docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert!(doc["paths"]["/health"].is_object());
    assert!(doc["paths"]["/api/csrf-token"].is_object());
    assert!(doc["components"]["schemas"]["ErrorBody"].is_object());
}
