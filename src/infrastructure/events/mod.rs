mod database_sink;
mod tracing_sink;

pub use database_sink::DatabaseSecurityEventSink;
pub use tracing_sink::TracingSecurityEventSink;
