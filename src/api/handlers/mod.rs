pub mod csrf_token;
pub mod health;

pub use csrf_token::{csrf_token_handler, CsrfTokenState};
pub use health::{health_handler, readiness_handler, HealthState};
