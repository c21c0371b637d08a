//! Transport contract.
//!
//! A [`Transport`] performs the actual call for a [`Request`]. Enhancers
//! wrap a transport and are transports themselves, so they stack.
//!
//! Results travel as [`Handle`]s: lazy shared futures that can be stored
//! before anyone awaits them. Every clone of a handle observes the same
//! outcome of a single transport call.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::request::Request;

/// Shared, lazily driven result of one transport call.
pub type Handle<R, E> = Shared<BoxFuture<'static, Result<R, E>>>;

/// Wraps a future into a [`Handle`].
pub fn into_handle<F, R, E>(future: F) -> Handle<R, E>
where
    F: Future<Output = Result<R, E>> + Send + 'static,
    R: Clone,
    E: Clone,
{
    future.boxed().shared()
}

/// Something that turns a [`Request`] into a response.
///
/// Responses and errors must be `Clone` because a single outcome may be
/// handed to many callers. Wrap non-`Clone` errors in an `Arc`.
///
/// # Examples
///
/// ```
/// use futures::future::{BoxFuture, FutureExt};
/// use recache_core::{Request, Transport};
///
/// #[derive(Clone)]
/// struct Echo;
///
/// impl Transport for Echo {
///     type Response = String;
///     type Error = String;
///
///     fn call(&self, request: Request) -> BoxFuture<'static, Result<String, String>> {
///         let url = request.url().to_owned();
///         async move { Ok(url) }.boxed()
///     }
/// }
/// ```
pub trait Transport: Clone + Send + Sync + 'static {
    /// Successful response.
    type Response: Clone + Send + Sync + 'static;

    /// Failure.
    type Error: Clone + Send + Sync + 'static;

    /// Issues the call described by `request`.
    ///
    /// Any bookkeeping an implementation does (store writes, dedup) must be
    /// done before the future is returned.
    fn call(&self, request: Request) -> BoxFuture<'static, Result<Self::Response, Self::Error>>;
}

/// [`Transport`] built from a closure. See [`transport_fn`].
#[derive(Clone, Copy, Debug)]
pub struct TransportFn<F> {
    f: F,
}

/// Adapts an async closure into a [`Transport`].
///
/// ```
/// use recache_core::{Request, Transport, transport_fn};
///
/// let transport = transport_fn(|request: Request| async move {
///     Ok::<_, String>(request.url().len())
/// });
/// # let _ = transport;
/// ```
pub fn transport_fn<F>(f: F) -> TransportFn<F> {
    TransportFn { f }
}

impl<F, Fut, R, E> Transport for TransportFn<F>
where
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Response = R;
    type Error = E;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<R, E>> {
        (self.f)(request).boxed()
    }
}
