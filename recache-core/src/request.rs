//! Request descriptor types.
//!
//! A [`Request`] describes one logical call: method, target URL, query
//! parameters, an optional JSON body and a bag of free-form per-request
//! [`Options`] that enhancers read their switches from.
//!
//! Requests are immutable while they travel through an enhancer chain.
//! Enhancers that need to issue the same call again (retry, background
//! revalidation) clone the descriptor.
//!
//! ```
//! use recache_core::Request;
//!
//! let request = Request::get("/users")
//!     .with_param("page", "2")
//!     .with_option("cache", false);
//!
//! assert_eq!(request.url(), "/users");
//! assert!(request.is_read());
//! assert_eq!(request.option("cache").and_then(|v| v.as_bool()), Some(false));
//! ```

use std::fmt;
use std::sync::Arc;

use http::Method;
use serde_json::Value;
use smol_str::SmolStr;

use crate::options::{OptionValue, Options};

/// Ordered query parameters as `(name, value)` pairs.
pub type Params = Vec<(String, String)>;

type SerializeFn = dyn Fn(&[(String, String)]) -> String + Send + Sync;

/// Custom query string serializer.
///
/// Replaces the default `application/x-www-form-urlencoded` serialization
/// used when building URLs and cache keys. The serializer must not add the
/// leading `?`.
#[derive(Clone)]
pub struct ParamsSerializer(Arc<SerializeFn>);

impl ParamsSerializer {
    /// Wraps a serialization function.
    pub fn new<F>(serialize: F) -> Self
    where
        F: Fn(&[(String, String)]) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(serialize))
    }

    /// Serializes the given parameters into a query string.
    pub fn serialize(&self, params: &[(String, String)]) -> String {
        (self.0)(params)
    }
}

impl fmt::Debug for ParamsSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamsSerializer(..)")
    }
}

/// Descriptor of one outgoing call.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    url: String,
    params: Params,
    body: Option<Value>,
    options: Options,
    serializer: Option<ParamsSerializer>,
}

impl Request {
    /// Creates a request with the given method and target URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Params::new(),
            body: None,
            options: Options::default(),
            serializer: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Appends a query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Appends several query parameters, keeping their order.
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a per-request option.
    pub fn with_option(mut self, name: impl Into<SmolStr>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name, value);
        self
    }

    /// Replaces all per-request options.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Sets a custom query string serializer.
    pub fn with_serializer(mut self, serializer: ParamsSerializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Returns the request method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the target URL as given, without parameters appended.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the query parameters in insertion order.
    #[inline]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Returns the JSON body, if any.
    #[inline]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Returns the per-request option bag.
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the custom query string serializer, if any.
    #[inline]
    pub fn serializer(&self) -> Option<&ParamsSerializer> {
        self.serializer.as_ref()
    }

    /// Returns a present (non-null) option value.
    #[inline]
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// Returns `true` when the named option is present and truthy.
    #[inline]
    pub fn flag(&self, name: &str) -> bool {
        self.options.is_truthy(name)
    }

    /// Returns `true` for read requests (`GET`).
    #[inline]
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }
}
