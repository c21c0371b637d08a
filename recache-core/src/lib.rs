#![warn(missing_docs)]
//! # recache-core
//!
//! Core traits and types for the recache request caching layer.
//!
//! This crate holds the pieces every enhancer in the `recache` crate is built
//! from, and that alternative stores or transports need to implement:
//!
//! - **Describe** an outgoing call ([`Request`], [`Options`], [`OptionValue`])
//! - **Identify** it with a canonical, order-independent key ([`CacheKey`])
//! - **Store** pending or resolved results ([`CacheLike`], [`MapStore`])
//! - **Probe** a per-request option for a store override ([`is_store_like`])
//! - **Call** the underlying transport ([`Transport`], [`transport_fn`])
//!
//! ## Handles
//!
//! Enhancers never cache plain responses. They cache a [`Handle`], a shared
//! future of the transport result. A handle is written to the store before
//! anyone polls it, so identical requests arriving while the first call is
//! still in flight resolve from the same transport call.

pub mod error;
pub mod key;
pub mod options;
pub mod probe;
pub mod request;
pub mod store;
pub mod transport;

pub use error::KeyError;
pub use key::{CacheKey, build_sorted_url};
pub use options::{OptionValue, Options};
pub use probe::is_store_like;
pub use request::{Params, ParamsSerializer, Request};
pub use store::{CacheLike, MapStore, SharedStore};
pub use transport::{Handle, Transport, TransportFn, into_handle, transport_fn};

#[doc(hidden)]
pub use smol_str::SmolStr;
