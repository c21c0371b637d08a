//! Per-request option bag.
//!
//! Enhancers read their switches (`cache`, `forceUpdate`, `retryTimes`, ...)
//! from [`Options`] carried by each [`Request`](crate::Request). Values are
//! loosely typed: a flag may be a boolean, a number or a store object, and
//! each enhancer decides how to interpret what it finds.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use smol_str::SmolStr;

use crate::store::{CacheLike, SharedStore};

/// Loosely typed option value.
#[derive(Clone)]
pub enum OptionValue {
    /// Explicitly unset. Treated as absent by every lookup.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Unsigned number, used for counts and durations in milliseconds.
    Number(u64),
    /// Short text.
    Text(SmolStr),
    /// Arbitrary shared object, typically a store override.
    Object(Arc<dyn Any + Send + Sync>),
}

impl OptionValue {
    /// Wraps a store so it can be passed as a per-request override.
    pub fn store<V, S>(store: S) -> Self
    where
        V: 'static,
        S: CacheLike<V> + 'static,
    {
        Self::shared_store(Arc::new(store) as SharedStore<V>)
    }

    /// Wraps an already shared store.
    pub fn shared_store<V: 'static>(store: SharedStore<V>) -> Self {
        Self::Object(Arc::new(store))
    }

    /// Returns `false` only for [`OptionValue::Null`].
    #[inline]
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Null)
    }

    /// Loose truthiness: `false`, `0`, an empty text and `Null` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// Returns the boolean, if this is one.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    #[inline]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text, if this is one.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the wrapped store when the object holds a
    /// [`SharedStore<V>`].
    pub fn as_store<V: 'static>(&self) -> Option<SharedStore<V>> {
        match self {
            Self::Object(obj) => obj.downcast_ref::<SharedStore<V>>().cloned(),
            _ => None,
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Number(u64::from(value))
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(SmolStr::new(value))
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(SmolStr::from(value))
    }
}

/// Durations are carried as whole milliseconds.
impl From<Duration> for OptionValue {
    fn from(value: Duration) -> Self {
        Self::Number(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Named option values attached to a request.
#[derive(Clone, Debug, Default)]
pub struct Options {
    inner: HashMap<SmolStr, OptionValue>,
}

impl Options {
    /// Creates an empty option bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<SmolStr>, value: impl Into<OptionValue>) {
        self.inner.insert(name.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<SmolStr>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value only if it is present (not [`OptionValue::Null`]).
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.inner.get(name).filter(|v| v.is_present())
    }

    /// Returns the stored value, including `Null`.
    pub fn get_raw(&self, name: &str) -> Option<&OptionValue> {
        self.inner.get(name)
    }

    /// `true` when the option is present and truthy.
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(OptionValue::is_truthy)
    }

    /// Removes an option, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        self.inner.remove(name)
    }

    /// Number of stored options, `Null` entries included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` when no option is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over stored options in arbitrary order.
    pub fn iter(&self) -> hash_map::Iter<'_, SmolStr, OptionValue> {
        self.inner.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Options
where
    K: Into<SmolStr>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
