//! Cache error types.

use thiserror::Error;

/// Errors raised by cache backends.
///
/// These never leave [`CacheManager`](crate::cache::CacheManager): every
/// variant is logged there and turned into a miss or a no-op.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Cache connection failed: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache operation timed out after {0} ms")]
    Timeout(u64),
}
