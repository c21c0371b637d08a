//! Cache key derivation.
//!
//! A [`CacheKey`] identifies a request by what it asks for rather than how it
//! was spelled. Query parameters are merged into the URL and sorted, so
//! `?b=2&a=1` and `?a=1&b=2` produce the same key. Fragments never reach the
//! key. For write methods that are cached explicitly, the JSON body is
//! appended in canonical form (object keys sorted recursively).

use std::borrow::Borrow;
use std::fmt;

use serde_json::Value;
use smol_str::SmolStr;

use crate::error::KeyError;
use crate::request::{ParamsSerializer, Request};

/// Canonical identity of a request.
///
/// # Example
/// ```
/// use recache_core::{CacheKey, Request};
///
/// let a = Request::get("/users").with_param("b", 2).with_param("a", 1);
/// let b = Request::get("/users?a=1").with_param("b", 2);
///
/// assert_eq!(
///     CacheKey::from_request(&a, false).unwrap(),
///     CacheKey::from_request(&b, false).unwrap(),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Creates a key from an already canonical string.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Derives the key of a request.
    ///
    /// When `include_body` is set and the request carries a body, the
    /// canonical JSON body is appended after `#body=`.
    pub fn from_request(request: &Request, include_body: bool) -> Result<Self, KeyError> {
        let url = build_sorted_url(request.url(), request.params(), request.serializer())?;
        match request.body() {
            Some(body) if include_body => {
                let mut key = url;
                key.push_str("#body=");
                write_canonical(body, &mut key);
                Ok(Self(SmolStr::from(key)))
            }
            _ => Ok(Self(SmolStr::from(url))),
        }
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CacheKey {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for CacheKey {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl AsRef<str> for CacheKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Builds the request URL with parameters merged in and query pairs sorted.
///
/// Parameters are serialized with `serde_urlencoded` unless a custom
/// serializer is given, then appended with `&` if the URL already has a
/// query and `?` otherwise. Any `#fragment` is dropped. Empty pairs (from
/// `&&` or a trailing `&`) are removed, and a `?` left with no pairs after
/// it is dropped as well, so `/users?` and `/users` share one cache key.
pub fn build_sorted_url(
    url: &str,
    params: &[(String, String)],
    serializer: Option<&ParamsSerializer>,
) -> Result<String, KeyError> {
    let url = match url.split_once('#') {
        Some((head, _fragment)) => head,
        None => url,
    };

    let serialized = if params.is_empty() {
        String::new()
    } else {
        match serializer {
            Some(custom) => custom.serialize(params),
            None => serde_urlencoded::to_string(params)?,
        }
    };

    let mut full = String::with_capacity(url.len() + serialized.len() + 1);
    full.push_str(url);
    if !serialized.is_empty() {
        full.push(if url.contains('?') { '&' } else { '?' });
        full.push_str(&serialized);
    }

    let Some((base, query)) = full.split_once('?') else {
        return Ok(full);
    };

    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    if pairs.is_empty() {
        return Ok(base.to_owned());
    }
    pairs.sort_unstable();

    Ok(format!("{base}?{}", pairs.join("&")))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
