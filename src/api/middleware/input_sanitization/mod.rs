//! Markup sanitization of client input.
//!
//! Every string reaching a handler (JSON and form bodies, query values,
//! path segments) has dangerous elements, comments and tags removed.

pub mod config;
pub mod middleware;
pub mod sanitizers;


pub use config::SanitizationConfig;
pub use middleware::{sanitization_middleware, SanitizationMiddleware};
pub use sanitizers::{SanitizedChange, Sanitizer, DEFAULT_SANITIZER};

/// Sanitize a single string with the default rules.
pub fn sanitize_str(input: &str) -> String {
    DEFAULT_SANITIZER.sanitize_str(input)
}
