//! Resolution of who a request is accounted against.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::domain::value_objects::{AuthenticatedUser, ClientKey, SessionId};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Which caller-supplied identity headers are believed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Accept `X-User-Id` as the authenticated user. Only enable behind a
    /// proxy that strips the header from client requests; otherwise a
    /// client can rotate it to escape per-user limits.
    pub trust_user_id_header: bool,
}

impl IdentityConfig {
    pub fn with_trusted_user_id_header(mut self, trusted: bool) -> Self {
        self.trust_user_id_header = trusted;
        self
    }
}

/// Promotes a trusted `X-User-Id` header to an `AuthenticatedUser`
/// extension. An extension set by an upstream auth layer is never replaced.
#[derive(Debug, Clone, Default)]
pub struct ClientIdentityMiddleware {
    config: IdentityConfig,
}

impl ClientIdentityMiddleware {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, request: &mut Request) {
        if !self.config.trust_user_id_header
            || request.extensions().get::<AuthenticatedUser>().is_some()
        {
            return;
        }

        let user = request
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| ClientKey::user(id).is_ok())
            .map(AuthenticatedUser::new);
        if let Some(user) = user {
            request.extensions_mut().insert(user);
        }
    }

    pub async fn layer(&self, mut request: Request, next: Next) -> Response {
        self.resolve(&mut request);
        next.run(request).await
    }
}

/// Axum entry point for identity resolution.
pub async fn client_identity_middleware(
    State(middleware): State<Arc<ClientIdentityMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    middleware.layer(request, next).await
}

/// Rate-limit identity: authenticated user first, then network address.
///
/// `X-User-Id` only counts once `ClientIdentityMiddleware` has promoted it.
pub fn client_key(request: &Request) -> ClientKey {
    if let Some(user) = request.extensions().get::<AuthenticatedUser>() {
        if let Ok(key) = ClientKey::user(&user.user_id) {
            return key;
        }
    }

    ClientKey::ip(client_ip(request).unwrap_or_else(|| "unknown".to_string()))
}

/// Client address from proxy headers, then the socket peer.
pub fn client_ip(request: &Request) -> Option<String> {
    ip_from_headers(request.headers()).or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

fn ip_from_headers(headers: &HeaderMap) -> Option<String> {
    // Take the first IP in case of multiple
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
    {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_string())
}

/// Session from an upstream extension, else the named cookie.
pub fn session_id(request: &Request, cookie_name: &str) -> Option<SessionId> {
    if let Some(session) = request.extensions().get::<SessionId>() {
        return Some(session.clone());
    }

    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .and_then(|(_, value)| SessionId::new(value.trim().trim_matches('"')).ok())
}
