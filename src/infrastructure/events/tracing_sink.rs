use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::application::ports::{SecurityEventError, SecurityEventSink};
use crate::domain::entities::{SecurityEvent, Severity};

/// Writes security events to the structured log, level chosen by severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSecurityEventSink;

#[async_trait]
impl SecurityEventSink for TracingSecurityEventSink {
    async fn record(&self, event: SecurityEvent) -> Result<(), SecurityEventError> {
        let details = serde_json::to_string(&event.details)?;
        let actor = event.actor.as_deref().unwrap_or("-");
        let path = event.path.as_deref().unwrap_or("-");

        match event.severity {
            Severity::Critical | Severity::High => error!(
                target: "security",
                event_type = %event.event_type,
                severity = %event.severity,
                actor,
                path,
                details = %details,
                "security event"
            ),
            Severity::Medium => warn!(
                target: "security",
                event_type = %event.event_type,
                severity = %event.severity,
                actor,
                path,
                details = %details,
                "security event"
            ),
            Severity::Low => info!(
                target: "security",
                event_type = %event.event_type,
                severity = %event.severity,
                actor,
                path,
                details = %details,
                "security event"
            ),
        }

        Ok(())
    }
}
