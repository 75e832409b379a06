use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid session identifier: {0}")]
    InvalidSessionId(String),

    #[error("Invalid client key: {0}")]
    InvalidClientKey(String),
}

/// Failures raised by the token and counter stores.
///
/// The in-memory stores never produce these; shared external stores
/// (key-value backends) surface connectivity and protocol errors here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation failed: {0}")]
    Operation(String),
}
