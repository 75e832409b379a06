use chrono::TimeDelta;
use rand::RngCore;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::application::ports::{Clock, TokenStore};
use crate::application::security_events::SecurityEventLogger;
use crate::domain::entities::{CsrfTokenRecord, IssuedToken, SecurityEvent, SecurityEventType, Severity};
use crate::domain::errors::StoreError;
use crate::domain::value_objects::SessionId;

const TOKEN_BYTES: usize = 32;

/// Issues and validates per-session CSRF tokens.
pub struct CsrfTokenService {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    events: SecurityEventLogger,
    ttl: TimeDelta,
}

impl CsrfTokenService {
    pub fn new(
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        events: SecurityEventLogger,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            store,
            clock,
            events,
            ttl,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Generate a fresh token for the session, replacing any previous one.
    pub async fn issue(&self, session_id: &SessionId) -> Result<IssuedToken, StoreError> {
        let now = self.clock.now();
        let record = CsrfTokenRecord::new(session_id.clone(), generate_token(), now + self.ttl);
        let issued = IssuedToken::from(&record);
        self.store.set(record).await?;

        debug!(session = %session_id.fingerprint(), "CSRF token issued");
        self.events.emit(
            SecurityEvent::new(SecurityEventType::CsrfTokenIssued, Severity::Low, now).with_details(
                json!({
                    "session": session_id.fingerprint(),
                    "expiresAt": issued.expires_at.to_rfc3339(),
                }),
            ),
        );

        Ok(issued)
    }

    /// True only for an exact match on an unexpired token. Missing,
    /// expired and mismatched tokens all read as `false`.
    pub async fn validate(&self, session_id: &SessionId, presented: &str) -> Result<bool, StoreError> {
        let Some(record) = self.store.get(session_id).await? else {
            return Ok(false);
        };

        let now = self.clock.now();
        if record.is_expired(now) {
            // Conditional, so a token issued since the read is kept.
            self.store.delete_if_expired(session_id, now).await?;
            return Ok(false);
        }

        Ok(constant_time_eq(record.token(), presented))
    }

    pub async fn sweep(&self) -> Result<usize, StoreError> {
        self.store.sweep(self.clock.now()).await
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
