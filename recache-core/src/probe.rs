//! Store capability probe.

use crate::options::OptionValue;

/// Returns `true` when the option value carries a usable store for values of
/// type `V`.
///
/// Enhancers use this to decide whether a per-request option overrides their
/// default store. Anything else (flags, numbers, stores of a different value
/// type) is ignored.
pub fn is_store_like<V: 'static>(value: &OptionValue) -> bool {
    value.as_store::<V>().is_some()
}
