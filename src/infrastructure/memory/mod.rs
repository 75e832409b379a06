mod rate_limit_store;
mod token_store;

pub use rate_limit_store::InMemoryRateLimitStore;
pub use token_store::InMemoryTokenStore;
