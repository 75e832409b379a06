use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use crate::api::errors::{ApiError, ErrorBody, ErrorCode};
use crate::api::middleware::client_identity;
use crate::application::csrf_tokens::CsrfTokenService;
use crate::domain::entities::IssuedToken;

/// State for the token retrieval endpoint.
#[derive(Clone)]
pub struct CsrfTokenState {
    pub service: Arc<CsrfTokenService>,
    pub session_cookie: String,
}

/// GET /api/csrf-token
/// Issue a fresh token for the caller's session, replacing the previous one.
#[utoipa::path(
    get,
    path = "/api/csrf-token",
    tag = "csrf",
    responses(
        (status = 200, description = "Token issued", body = IssuedToken),
        (status = 403, description = "No session", body = ErrorBody)
    )
)]
pub async fn csrf_token_handler(
    State(state): State<CsrfTokenState>,
    request: Request,
) -> Result<Response, ApiError> {
    let Some(session) = client_identity::session_id(&request, &state.session_cookie) else {
        return Err(ApiError::forbidden(
            ErrorCode::CsrfNoSession,
            "No session found for CSRF token",
        ));
    };

    let issued = state.service.issue(&session).await?;

    let mut response = Json(issued).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
