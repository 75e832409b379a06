mod csrf_token;
mod rate_window;
mod security_event;

pub use csrf_token::{CsrfTokenRecord, IssuedToken};
pub use rate_window::{retry_after_secs, RateWindow};
pub use security_event::{SecurityEvent, SecurityEventType, Severity};
