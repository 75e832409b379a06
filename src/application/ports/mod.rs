mod clock;
mod rate_limit_store;
mod security_event_repository;
mod security_event_sink;
mod token_store;

pub use clock::Clock;
pub use rate_limit_store::RateLimitStore;
pub use security_event_repository::{SecurityEventRepository, SecurityEventRepositoryError};
pub use security_event_sink::{SecurityEventError, SecurityEventSink};
pub use token_store::TokenStore;

#[cfg(test)]
pub use clock::MockClock;
#[cfg(test)]
pub use rate_limit_store::MockRateLimitStore;
#[cfg(test)]
pub use security_event_repository::MockSecurityEventRepository;
#[cfg(test)]
pub use security_event_sink::MockSecurityEventSink;
#[cfg(test)]
pub use token_store::MockTokenStore;
