use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, uri::PathAndQuery, HeaderValue, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::config::SanitizationConfig;
use super::sanitizers::{SanitizedChange, Sanitizer};
use crate::api::errors::{ApiError, ErrorCode};
use crate::api::middleware::client_identity;
use crate::api::middleware::payload::{
    decode_pairs, encode_pairs, is_form, is_json, is_text, take_body, OriginalPayload,
};
use crate::application::ports::Clock;
use crate::application::security_events::SecurityEventLogger;
use crate::domain::entities::{SecurityEvent, SecurityEventType, Severity};

/// Bodies at least this large are sanitized on the blocking pool.
const BLOCKING_BODY_BYTES: usize = 64 * 1024;

/// Strips markup from every client-supplied string before routing.
pub struct SanitizationMiddleware {
    sanitizer: Arc<Sanitizer>,
    config: SanitizationConfig,
    events: SecurityEventLogger,
    clock: Arc<dyn Clock>,
}

impl SanitizationMiddleware {
    pub fn new(
        config: SanitizationConfig,
        events: SecurityEventLogger,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            sanitizer: Arc::new(Sanitizer::new(&config)?),
            config,
            events,
            clock,
        })
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub async fn layer(&self, request: Request, next: Next) -> Response {
        match self.sanitize_request(request).await {
            Ok(request) => next.run(request).await,
            Err(e) => e.into_response(),
        }
    }

    /// Rewrite path, query and body in place; the unmodified payload is
    /// kept in the `OriginalPayload` extension.
    pub async fn sanitize_request(&self, request: Request) -> Result<Request, ApiError> {
        let mut changes = Vec::new();
        let mut original = OriginalPayload::default();

        let (mut parts, body) = request.into_parts();
        parts.uri = self.sanitize_uri(&parts.uri, &mut original, &mut changes)?;
        let mut request = Request::from_parts(parts, body);

        if is_json(request.headers()) {
            request = self.sanitize_json_body(request, &mut original, &mut changes).await?;
        } else if is_form(request.headers()) {
            request = self.sanitize_form_body(request, &mut original, &mut changes).await?;
        } else {
            request = self.sanitize_other_body(request, &mut original, &mut changes).await?;
        }

        if !changes.is_empty() {
            self.report(&request, &changes);
        }

        request.extensions_mut().insert(original);
        Ok(request)
    }

    fn sanitize_uri(
        &self,
        uri: &Uri,
        original: &mut OriginalPayload,
        changes: &mut Vec<SanitizedChange>,
    ) -> Result<Uri, ApiError> {
        let path = if self.config.sanitize_path {
            self.sanitize_path(uri.path(), changes)
        } else {
            uri.path().to_string()
        };

        let query = match uri.query() {
            Some(q) => {
                let pairs = decode_pairs(q.as_bytes());
                let before = changes.len();
                let sanitized: Vec<(String, String)> = pairs
                    .iter()
                    .map(|(k, v)| {
                        let field = format!("query.{}", k);
                        (k.clone(), self.sanitizer.sanitize_field(&field, v.clone(), changes))
                    })
                    .collect();
                let rewritten = if changes.len() > before {
                    encode_pairs(&sanitized)
                } else {
                    q.to_string()
                };
                original.query = pairs;
                Some(rewritten)
            }
            None => None,
        };

        let path_and_query = match &query {
            Some(q) => format!("{}?{}", path, q),
            None => path,
        };
        if uri.path_and_query().map(|pq| pq.as_str()) == Some(path_and_query.as_str()) {
            return Ok(uri.clone());
        }

        let mut uri_parts = uri.clone().into_parts();
        uri_parts.path_and_query = Some(
            PathAndQuery::try_from(path_and_query)
                .map_err(|_| ApiError::bad_request(ErrorCode::InvalidRequest, "Malformed URI"))?,
        );
        Uri::from_parts(uri_parts)
            .map_err(|_| ApiError::bad_request(ErrorCode::InvalidRequest, "Malformed URI"))
    }

    fn sanitize_path(&self, path: &str, changes: &mut Vec<SanitizedChange>) -> String {
        path.split('/')
            .enumerate()
            .map(|(i, segment)| {
                let decoded =
                    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes()))
                        .into_owned();
                let field = format!("path[{}]", i);
                let before = changes.len();
                let clean = self.sanitizer.sanitize_field(&field, decoded, changes);
                if changes.len() > before {
                    urlencoding::encode(&clean).into_owned()
                } else {
                    segment.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn sanitize_json_body(
        &self,
        request: Request,
        original: &mut OriginalPayload,
        changes: &mut Vec<SanitizedChange>,
    ) -> Result<Request, ApiError> {
        let (request, bytes) = take_body(request, self.config.max_body_bytes).await?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(request);
        }

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(error = %e, "Rejecting malformed JSON body");
            ApiError::bad_request(ErrorCode::InvalidJson, "Malformed JSON body")
        })?;

        let before = changes.len();
        let copy = value.clone();
        let (sanitized, found) = self
            .run_sanitizer(bytes.len(), move |sanitizer| {
                let mut found = Vec::new();
                let sanitized = sanitizer.sanitize_value(copy, &mut found);
                (sanitized, found)
            })
            .await?;
        changes.extend(found);
        original.json = Some(value);

        // Depth-capped values differ without a string change.
        if changes.len() == before && Some(&sanitized) == original.json.as_ref() {
            return Ok(request);
        }

        let body = serde_json::to_vec(&sanitized)
            .map_err(|_| ApiError::internal_error("Failed to re-encode request body"))?;
        Ok(replace_body(request, body))
    }

    async fn sanitize_form_body(
        &self,
        request: Request,
        original: &mut OriginalPayload,
        changes: &mut Vec<SanitizedChange>,
    ) -> Result<Request, ApiError> {
        let (request, bytes) = take_body(request, self.config.max_body_bytes).await?;
        let pairs = decode_pairs(&bytes);

        let before = changes.len();
        let copy = pairs.clone();
        let (sanitized, found) = self
            .run_sanitizer(bytes.len(), move |sanitizer| {
                let mut found = Vec::new();
                let sanitized: Vec<(String, String)> = copy
                    .into_iter()
                    .map(|(k, v)| {
                        let field = format!("form.{}", k);
                        let v = sanitizer.sanitize_field(&field, v, &mut found);
                        (k, v)
                    })
                    .collect();
                (sanitized, found)
            })
            .await?;
        changes.extend(found);
        original.form = pairs;

        if changes.len() == before {
            return Ok(request);
        }
        Ok(replace_body(request, encode_pairs(&sanitized).into_bytes()))
    }

    /// Bodies of any other type are scanned as text. Plain UTF-8 text is
    /// also sanitized as a single string.
    async fn sanitize_other_body(
        &self,
        request: Request,
        original: &mut OriginalPayload,
        changes: &mut Vec<SanitizedChange>,
    ) -> Result<Request, ApiError> {
        let (request, bytes) = take_body(request, self.config.max_body_bytes).await?;
        if bytes.is_empty() {
            return Ok(request);
        }

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) if is_text(request.headers()) => text.to_string(),
            _ => {
                original.raw_body = Some(String::from_utf8_lossy(&bytes).into_owned());
                return Ok(request);
            }
        };

        let before = changes.len();
        let copy = text.clone();
        let (sanitized, found) = self
            .run_sanitizer(bytes.len(), move |sanitizer| {
                let mut found = Vec::new();
                let sanitized = sanitizer.sanitize_field("body", copy, &mut found);
                (sanitized, found)
            })
            .await?;
        changes.extend(found);
        original.raw_body = Some(text);

        if changes.len() == before {
            return Ok(request);
        }
        Ok(replace_body(request, sanitized.into_bytes()))
    }

    /// Run `f` inline for small bodies and on the blocking pool otherwise.
    async fn run_sanitizer<T, F>(&self, body_len: usize, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Sanitizer) -> T + Send + 'static,
    {
        if body_len < BLOCKING_BODY_BYTES {
            return Ok(f(&*self.sanitizer));
        }
        let sanitizer = Arc::clone(&self.sanitizer);
        tokio::task::spawn_blocking(move || f(&*sanitizer))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Sanitizer task failed");
                ApiError::internal_error("Failed to sanitize request body")
            })
    }

    fn report(&self, request: &Request, changes: &[SanitizedChange]) {
        let limit = self.config.max_event_value_chars;
        let fields: Vec<Value> = changes
            .iter()
            .map(|c| {
                json!({
                    "field": c.field,
                    "original": truncate(&c.original, limit),
                    "sanitized": truncate(&c.sanitized, limit),
                })
            })
            .collect();

        let key = client_identity::client_key(request);
        tracing::warn!(
            key = %key,
            path = %request.uri().path(),
            fields = changes.len(),
            "Markup removed from request input"
        );

        self.events.emit(
            SecurityEvent::new(
                SecurityEventType::XssAttemptDetected,
                Severity::High,
                self.clock.now(),
            )
            .with_actor(key.to_string())
            .with_ip_address(client_identity::client_ip(request))
            .with_path(request.uri().path())
            .with_details(json!({
                "method": request.method().as_str(),
                "fields": fields,
            })),
        );
    }
}

fn replace_body(request: Request, body: Vec<u8>) -> Request {
    let (mut parts, _) = request.into_parts();
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    Request::from_parts(parts, Body::from(body))
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Axum entry point for the sanitization layer.
pub async fn sanitization_middleware(
    State(middleware): State<Arc<SanitizationMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    middleware.layer(request, next).await
}
