//! Metrics declaration and initialization.
//!
//! Every recording helper is a no-op when the `metrics` feature is disabled.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Cache decision metrics

    /// Track number of requests served from a stored handle.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "recache_cache_hit_total",
            "Total number of requests served from a stored handle."
        );
        "recache_cache_hit_total"
    };
    /// Track number of requests that issued a transport call to fill the cache.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "recache_cache_miss_total",
            "Total number of cache miss events."
        );
        "recache_cache_miss_total"
    };
    /// Track number of requests forwarded without touching the cache.
    pub static ref CACHE_BYPASS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "recache_cache_bypass_total",
            "Total number of requests that bypassed the cache."
        );
        "recache_cache_bypass_total"
    };
    /// Track number of stored entries evicted after a failed call.
    pub static ref CACHE_EVICTION_COUNTER: &'static str = {
        metrics::describe_counter!(
            "recache_cache_evicted_total",
            "Total number of entries evicted after a failed call."
        );
        "recache_cache_evicted_total"
    };

    // Revalidation metrics

    /// Track number of background revalidations started.
    pub static ref REVALIDATION_STARTED: &'static str = {
        metrics::describe_counter!(
            "recache_revalidation_started_total",
            "Total number of background revalidations started."
        );
        "recache_revalidation_started_total"
    };
    /// Track number of background revalidations that failed.
    pub static ref REVALIDATION_FAILED: &'static str = {
        metrics::describe_counter!(
            "recache_revalidation_failed_total",
            "Total number of background revalidations that failed."
        );
        "recache_revalidation_failed_total"
    };

    // Throttle and retry metrics

    /// Track number of requests answered from the throttle window.
    pub static ref THROTTLE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "recache_throttle_hit_total",
            "Total number of requests answered from the throttle window."
        );
        "recache_throttle_hit_total"
    };
    /// Track number of retried attempts.
    pub static ref RETRY_ATTEMPTS: &'static str = {
        metrics::describe_counter!(
            "recache_retry_attempts_total",
            "Total number of retried transport attempts."
        );
        "recache_retry_attempts_total"
    };

    /// Track number of revalidations skipped because one was already running.
    pub static ref REVALIDATION_SKIPPED: &'static str = {
        metrics::describe_counter!(
            "recache_revalidation_skipped_total",
            "Total number of revalidations skipped while another one of the same entry ran."
        );
        "recache_revalidation_skipped_total"
    };
    /// Track number of revalidations aborted by the cancel timeout.
    pub static ref REVALIDATION_TIMED_OUT: &'static str = {
        metrics::describe_counter!(
            "recache_revalidation_timed_out_total",
            "Total number of revalidations aborted after the configured timeout."
        );
        "recache_revalidation_timed_out_total"
    };
    /// Gauge of revalidations currently running.
    pub static ref REVALIDATIONS_RUNNING: &'static str = {
        metrics::describe_gauge!(
            "recache_revalidations_running",
            "Number of background revalidations currently running."
        );
        "recache_revalidations_running"
    };
    /// Histogram of revalidation run time.
    pub static ref REVALIDATION_DURATION: &'static str = {
        metrics::describe_histogram!(
            "recache_revalidation_duration_seconds",
            metrics::Unit::Seconds,
            "Run time of background revalidations in seconds."
        );
        "recache_revalidation_duration_seconds"
    };
}

/// Outcome of a caching decision, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Served from a stored handle.
    Hit,
    /// Issued a transport call and stored its handle.
    Miss,
    /// Forwarded without touching the store.
    Bypass,
}

/// Record a caching decision of the named enhancer.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_decision(enhancer: &'static str, decision: Decision) {
    let counter = match decision {
        Decision::Hit => *CACHE_HIT_COUNTER,
        Decision::Miss => *CACHE_MISS_COUNTER,
        Decision::Bypass => *CACHE_BYPASS_COUNTER,
    };
    metrics::counter!(counter, "enhancer" => enhancer).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_decision(_enhancer: &'static str, _decision: Decision) {}

/// Record an eviction after a failed call.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_eviction(enhancer: &'static str) {
    metrics::counter!(*CACHE_EVICTION_COUNTER, "enhancer" => enhancer).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_eviction(_enhancer: &'static str) {}

/// Record the start of a background revalidation.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_revalidation_started() {
    metrics::counter!(*REVALIDATION_STARTED).increment(1);
    metrics::gauge!(*REVALIDATIONS_RUNNING).increment(1.0);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_revalidation_started() {}

/// Record a failed background revalidation.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_revalidation_failed() {
    metrics::counter!(*REVALIDATION_FAILED).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_revalidation_failed() {}

/// Record a request answered from the throttle window.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_throttle_hit() {
    metrics::counter!(*THROTTLE_HIT_COUNTER).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_throttle_hit() {}

/// Record a retried attempt.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_retry_attempt() {
    metrics::counter!(*RETRY_ATTEMPTS).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_retry_attempt() {}

/// Record a revalidation skipped as a duplicate.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_revalidation_skipped() {
    metrics::counter!(*REVALIDATION_SKIPPED).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_revalidation_skipped() {}

/// Record the end of a background revalidation task.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_revalidation_finished(elapsed: std::time::Duration, timed_out: bool) {
    if timed_out {
        metrics::counter!(*REVALIDATION_TIMED_OUT).increment(1);
    }
    metrics::gauge!(*REVALIDATIONS_RUNNING).decrement(1.0);
    metrics::histogram!(*REVALIDATION_DURATION).record(elapsed.as_secs_f64());
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_revalidation_finished(_elapsed: std::time::Duration, _timed_out: bool) {}
