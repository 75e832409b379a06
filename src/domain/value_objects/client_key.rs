use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Identity a request is accounted against by the rate limiter.
///
/// Authenticated users are keyed by user id so callers sharing a NAT
/// address do not exhaust each other's budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientKey {
    User(String),
    Ip(String),
}

impl ClientKey {
    pub fn user(user_id: &str) -> Result<Self, DomainError> {
        let user_id = user_id.trim();
        if user_id.is_empty() || user_id.len() > 128 {
            return Err(DomainError::InvalidClientKey(
                "user id must be 1-128 characters".to_string(),
            ));
        }
        if user_id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(DomainError::InvalidClientKey(
                "user id contains whitespace or control characters".to_string(),
            ));
        }
        Ok(Self::User(user_id.to_string()))
    }

    pub fn ip(address: impl Into<String>) -> Self {
        Self::Ip(address.into())
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Ip(addr) => write!(f, "ip:{}", addr),
        }
    }
}

/// Identity placed into request extensions by an upstream authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl AuthenticatedUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}
