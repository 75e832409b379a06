pub mod builder;
pub mod csrf_tokens;
pub mod ports;
pub mod security_events;
pub mod sweeper;
