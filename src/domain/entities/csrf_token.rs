use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::SessionId;

/// Stored CSRF token bound to a single session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfTokenRecord {
    session_id: SessionId,
    token: String,
    expires_at: DateTime<Utc>,
}

impl CsrfTokenRecord {
    pub fn new(session_id: SessionId, token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            token,
            expires_at,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is expired from the instant `expires_at` is reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Token handed back to the client by the retrieval endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    #[serde(rename = "csrfToken")]
    pub token: String,
    /// Expiry as milliseconds since the Unix epoch.
    #[serde(rename = "expires", with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub expires_at: DateTime<Utc>,
}

impl From<&CsrfTokenRecord> for IssuedToken {
    fn from(record: &CsrfTokenRecord) -> Self {
        Self {
            token: record.token.clone(),
            expires_at: record.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(expires_at: DateTime<Utc>) -> CsrfTokenRecord {
        CsrfTokenRecord::new(
            SessionId::new("sess-1").unwrap(),
            "ab".repeat(32),
            expires_at,
        )
    }

    #[test]
    fn test_expiry_boundary() {
        let expires = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let r = record(expires);
        assert!(!r.is_expired(expires - Duration::milliseconds(1)));
        assert!(r.is_expired(expires));
        assert!(r.is_expired(expires + Duration::seconds(1)));
    }

    #[test]
    fn test_issued_token_serializes_epoch_millis() {
        let expires = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let issued = IssuedToken::from(&record(expires));
        let json = serde_json::to_value(&issued).unwrap();
        assert_eq!(json["csrfToken"], "ab".repeat(32));
        assert_eq!(json["expires"], expires.timestamp_millis());
    }
}
