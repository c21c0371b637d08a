#![doc = include_str!("../README.md")]

mod error;
mod response;
mod transport;

pub use error::TransportError;
pub use response::HttpResponse;
pub use transport::ReqwestTransport;

/// Re-export of the reqwest client for convenience in type annotations.
pub use reqwest::Client as ReqwestClient;
