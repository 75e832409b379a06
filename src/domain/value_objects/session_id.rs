use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::errors::DomainError;

const MAX_SESSION_ID_LENGTH: usize = 256;
const FINGERPRINT_HEX_CHARS: usize = 12;

/// Identifier of an authenticated session, supplied by the upstream
/// session mechanism. CSRF tokens are bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidSessionId(
                "session id cannot be empty".to_string(),
            ));
        }

        if trimmed.len() > MAX_SESSION_ID_LENGTH {
            return Err(DomainError::InvalidSessionId(format!(
                "session id exceeds {} characters",
                MAX_SESSION_ID_LENGTH
            )));
        }

        if trimmed.chars().any(|c| c.is_control()) {
            return Err(DomainError::InvalidSessionId(
                "session id contains control characters".to_string(),
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short, non-reversible tag safe to put in logs and security events.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(FINGERPRINT_HEX_CHARS);
        encoded
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_trims_whitespace() {
        let id = SessionId::new("  sess-1 ").unwrap();
        assert_eq!(id.as_str(), "sess-1");
    }

    #[test]
    fn test_session_id_rejects_empty() {
        assert!(SessionId::new("").is_err());
        assert!(SessionId::new("   ").is_err());
    }

    #[test]
    fn test_session_id_rejects_oversized_and_control_chars() {
        assert!(SessionId::new("a".repeat(300)).is_err());
        assert!(SessionId::new("sess\n1").is_err());
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let id = SessionId::new("sess-1").unwrap();
        let fp = id.fingerprint();
        assert_eq!(fp.len(), FINGERPRINT_HEX_CHARS);
        assert_eq!(fp, SessionId::new("sess-1").unwrap().fingerprint());
        assert_ne!(fp, SessionId::new("sess-2").unwrap().fingerprint());
        assert!(!fp.contains("sess"));
    }
}
