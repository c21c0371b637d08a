use std::sync::Arc;

use thiserror::Error;

use crate::response::HttpResponse;

/// Failure of a [`ReqwestTransport`](crate::ReqwestTransport) call.
///
/// Cloneable, since one failure may be delivered to every caller sharing a
/// cache entry.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request URL could not be built.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Body(Arc<serde_json::Error>),
    /// Connection, timeout or protocol failure.
    #[error("request failed: {0}")]
    Request(Arc<reqwest::Error>),
    /// The server answered with a non-success status.
    #[error("server responded with status {}", .0.status)]
    Status(HttpResponse),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(Arc::new(error))
    }
}

impl TransportError {
    /// Returns the response of a [`TransportError::Status`] failure.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }
}
