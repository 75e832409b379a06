mod client_key;
mod session_id;
mod threat;

pub use client_key::{AuthenticatedUser, ClientKey};
pub use session_id::SessionId;
pub use threat::{ThreatAssessment, ThreatIndicator, MAX_RISK_SCORE};
