//! Error types for key derivation.

use thiserror::Error;

/// Failure to derive a [`CacheKey`](crate::CacheKey) from a request.
///
/// Enhancers treat this as "not cacheable": the request is forwarded to the
/// transport untouched and the failure is logged.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Query parameters could not be serialized into a query string.
    #[error("failed to serialize query parameters: {0}")]
    Params(#[from] serde_urlencoded::ser::Error),
}
