use std::sync::Arc;

use crate::application::ports::SecurityEventSink;
use crate::domain::entities::SecurityEvent;

/// Fire-and-forget front for the configured [`SecurityEventSink`].
///
/// `emit` returns immediately; the sink runs on a spawned task and its
/// failures are logged, never propagated to the request.
#[derive(Clone)]
pub struct SecurityEventLogger {
    sink: Arc<dyn SecurityEventSink>,
}

impl SecurityEventLogger {
    pub fn new(sink: Arc<dyn SecurityEventSink>) -> Self {
        Self { sink }
    }

    pub fn emit(&self, event: SecurityEvent) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let event_type = event.event_type;
            if let Err(e) = sink.record(event).await {
                tracing::error!(event_type = %event_type, error = %e, "Failed to record security event");
            }
        });
    }

    /// Record inline. Used where the caller is already off the request path.
    pub async fn record(&self, event: SecurityEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.sink.record(event).await {
            tracing::error!(event_type = %event_type, error = %e, "Failed to record security event");
        }
    }
}
