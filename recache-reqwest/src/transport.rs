//! reqwest-backed [`Transport`].

use futures::future::{BoxFuture, FutureExt};
use http::header::CONTENT_TYPE;
use recache_core::{Request, Transport, build_sorted_url};
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::TransportError;
use crate::response::HttpResponse;

/// [`Transport`] that issues requests with a [`reqwest::Client`].
///
/// Query parameters are appended to the URL in sorted order and JSON
/// bodies are sent with an `application/json` content type. Relative URLs
/// are resolved against the base URL when one is set.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Option<Url>,
}

impl ReqwestTransport {
    /// Wraps a client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Resolves relative request URLs against `base_url`.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Returns the wrapped client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn url(&self, request: &Request) -> Result<Url, TransportError> {
        let url = build_sorted_url(request.url(), request.params(), request.serializer())
            .map_err(|error| TransportError::InvalidUrl(error.to_string()))?;
        let parsed = match &self.base_url {
            Some(base) => base.join(&url),
            None => Url::parse(&url),
        };
        parsed.map_err(|error| TransportError::InvalidUrl(format!("{url}: {error}")))
    }

    fn build(&self, request: &Request) -> Result<reqwest::RequestBuilder, TransportError> {
        let builder = self.client.request(request.method().clone(), self.url(request)?);
        Ok(match request.body() {
            Some(body) => {
                let bytes = serde_json::to_vec(body)
                    .map_err(|error| TransportError::Body(error.into()))?;
                builder.header(CONTENT_TYPE, "application/json").body(bytes)
            }
            None => builder,
        })
    }
}

impl Transport for ReqwestTransport {
    type Response = HttpResponse;
    type Error = TransportError;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        let builder = self.build(&request);
        let method = request.method().clone();

        async move {
            let response = builder?.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            debug!(%method, %status, "response received");

            let response = HttpResponse {
                status,
                headers,
                body,
            };
            if status.is_success() {
                Ok(response)
            } else {
                Err(TransportError::Status(response))
            }
        }
        .boxed()
    }
}
