//! Request body buffering shared by the body-inspecting middlewares.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderMap},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;

use crate::api::errors::{ApiError, ErrorCode};

/// Payload as the client sent it, before sanitization rewrote it.
#[derive(Debug, Clone, Default)]
pub struct OriginalPayload {
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
    pub form: Vec<(String, String)>,
    /// Any other body, decoded lossily.
    pub raw_body: Option<String>,
}

impl OriginalPayload {
    /// All client-supplied text joined for pattern scanning.
    pub fn scan_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for (k, v) in self.query.iter().chain(self.form.iter()) {
            parts.push(k);
            parts.push(v);
        }
        if let Some(json) = &self.json {
            collect_strings(json, &mut parts);
        }
        if let Some(raw) = &self.raw_body {
            parts.push(raw);
        }
        parts.join("\n")
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => {
            for (k, v) in map {
                out.push(k);
                collect_strings(v, out);
            }
        }
        _ => {}
    }
}

pub fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers)
        .map(|ct| ct == "application/json" || ct.ends_with("+json"))
        .unwrap_or(false)
}

pub fn is_form(headers: &HeaderMap) -> bool {
    content_type(headers)
        .map(|ct| ct == "application/x-www-form-urlencoded")
        .unwrap_or(false)
}

pub fn is_text(headers: &HeaderMap) -> bool {
    content_type(headers)
        .map(|ct| ct == "text/plain")
        .unwrap_or(false)
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
}

/// Read the whole body, refusing anything over `limit` bytes.
pub async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::payload_too_large(limit))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            Err(ApiError::bad_request(
                ErrorCode::InvalidRequest,
                "Unreadable request body",
            ))
        }
    }
}

/// Buffer the body of `request` and hand back the bytes plus a request
/// whose body replays them.
pub async fn take_body(request: Request, limit: usize) -> Result<(Request, Bytes), ApiError> {
    if let Some(declared) = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if declared > limit {
            return Err(ApiError::payload_too_large(limit));
        }
    }

    let (parts, body) = request.into_parts();
    let bytes = buffer_body(body, limit).await?;
    Ok((Request::from_parts(parts, Body::from(bytes.clone())), bytes))
}

/// Decoded `key=value` pairs of a URL-encoded string.
pub fn decode_pairs(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}
