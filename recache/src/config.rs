//! Serde settings for every enhancer.
//!
//! [`Settings`] is the one options object a composed chain is built from.
//! Each enhancer reads only its own section, so flag names never collide.
//! Durations use humantime notation (`"300ms"`, `"5m"`).
//!
//! ```
//! use std::time::Duration;
//! use recache::config::Settings;
//!
//! let settings: Settings = serde_json::from_str(r#"{
//!     "cache": { "ttl": "1m", "methods": ["get", "post"] },
//!     "retry": { "times": 4 }
//! }"#).unwrap();
//!
//! assert_eq!(settings.cache.ttl, Some(Duration::from_secs(60)));
//! assert_eq!(settings.retry.times, 4);
//! assert_eq!(settings.throttle.threshold, Duration::from_secs(1));
//! ```

use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Invalid settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A configured method name is not a valid HTTP method token.
    #[error("invalid HTTP method in settings: {0:?}")]
    InvalidMethod(String),
}

/// Settings of the whole enhancer chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Plain cache enhancer.
    pub cache: CacheSettings,
    /// Stale-while-revalidate enhancer.
    pub swr: SwrSettings,
    /// Throttle enhancer.
    pub throttle: ThrottleSettings,
    /// Retry enhancer.
    pub retry: RetrySettings,
}

/// Plain cache enhancer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache requests that do not carry the cache flag.
    pub enabled_by_default: bool,
    /// Name of the per-request option that switches caching or supplies a store.
    pub cache_flag: SmolStr,
    /// Name of the per-request option that forces a fresh call.
    pub force_update_flag: SmolStr,
    /// Cacheable methods. Case-insensitive.
    pub methods: Vec<String>,
    /// Capacity of the default store.
    pub max_entries: u64,
    /// Time-to-live of the default store's entries.
    #[serde(with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled_by_default: true,
            cache_flag: SmolStr::new_static("cache"),
            force_update_flag: SmolStr::new_static("forceUpdate"),
            methods: vec!["GET".to_owned()],
            max_entries: 100,
            ttl: Some(Duration::from_secs(5 * 60)),
        }
    }
}

impl CacheSettings {
    /// Parses [`methods`](Self::methods) into HTTP methods.
    pub fn parse_methods(&self) -> Result<Vec<Method>, ConfigError> {
        self.methods
            .iter()
            .map(|name| {
                Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                    .map_err(|_| ConfigError::InvalidMethod(name.clone()))
            })
            .collect()
    }
}

/// Stale-while-revalidate enhancer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwrSettings {
    /// Caching rules and default store, as for the plain cache.
    pub cache: CacheSettings,
    /// Revalidate on hits unless a request says otherwise.
    pub revalidate: bool,
    /// Keep entries fresh for this long after a successful call.
    /// Without it every hit revalidates.
    #[serde(with = "humantime_serde")]
    pub keep_alive: Option<Duration>,
    /// Per-request option: `false`/`0` disables revalidation, a number sets
    /// the keep-alive window in milliseconds.
    pub revalidate_flag: SmolStr,
    /// Per-request option: keep-alive window in milliseconds.
    pub keep_alive_flag: SmolStr,
    /// Per-request option: revalidate on this hit regardless of freshness.
    pub force_revalidate_flag: SmolStr,
    /// Per-request option: freshness store override.
    pub freshness_flag: SmolStr,
    /// Background revalidation runner.
    pub refresh: RefreshSettings,
}

impl Default for SwrSettings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            revalidate: true,
            keep_alive: None,
            revalidate_flag: SmolStr::new_static("staleWhileRevalidate"),
            keep_alive_flag: SmolStr::new_static("keepAlive"),
            force_revalidate_flag: SmolStr::new_static("forceRevalidate"),
            freshness_flag: SmolStr::new_static("freshness"),
            refresh: RefreshSettings::default(),
        }
    }
}

/// Throttle enhancer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    /// Window during which identical GETs share one call.
    #[serde(with = "humantime_serde")]
    pub threshold: Duration,
    /// Capacity of the default record store.
    pub max_entries: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            threshold: Duration::from_secs(1),
            max_entries: 10,
        }
    }
}

/// Retry enhancer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first failed attempt.
    pub times: u32,
    /// Per-request option overriding `times`.
    pub times_flag: SmolStr,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            times: 2,
            times_flag: SmolStr::new_static("retryTimes"),
        }
    }
}

/// Settings of the runner that drives background revalidations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Time budget of a single revalidation.
    pub timeout: RefreshTimeout,
    /// Skip a stale hit's revalidation while one for the same entry runs.
    pub deduplicate: bool,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            timeout: RefreshTimeout::Unbounded,
            deduplicate: true,
        }
    }
}

/// Time budget of a background revalidation.
///
/// In YAML: `timeout: { type: Cancel, after: 5s }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RefreshTimeout {
    /// Let the revalidation finish however long it takes.
    #[default]
    Unbounded,
    /// Drop the revalidation task once `after` elapsed.
    ///
    /// The stored handle stays pending and is driven by the next caller.
    Cancel {
        /// Time budget.
        #[serde(with = "humantime_serde")]
        after: Duration,
    },
    /// Finish the revalidation, warning when it took longer than `after`.
    Warn {
        /// Time budget.
        #[serde(with = "humantime_serde")]
        after: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert!(settings.cache.enabled_by_default);
        assert_eq!(settings.cache.cache_flag, "cache");
        assert_eq!(settings.cache.parse_methods(), Ok(vec![Method::GET]));
        assert_eq!(settings.cache.max_entries, 100);
        assert_eq!(settings.cache.ttl, Some(Duration::from_secs(300)));
        assert!(settings.swr.revalidate);
        assert_eq!(settings.swr.keep_alive, None);
        assert_eq!(settings.throttle.threshold, Duration::from_millis(1000));
        assert_eq!(settings.throttle.max_entries, 10);
        assert_eq!(settings.retry.times, 2);
        assert_eq!(settings.retry.times_flag, "retryTimes");
        assert_eq!(settings.swr.refresh.timeout, RefreshTimeout::Unbounded);
        assert!(settings.swr.refresh.deduplicate);
    }

    #[test]
    fn methods_are_case_insensitive() {
        let settings = CacheSettings {
            methods: vec!["get".into(), "Post".into()],
            ..CacheSettings::default()
        };
        assert_eq!(
            settings.parse_methods(),
            Ok(vec![Method::GET, Method::POST])
        );
    }

    #[test]
    fn invalid_method_is_rejected() {
        let settings = CacheSettings {
            methods: vec!["not a method".into()],
            ..CacheSettings::default()
        };
        assert_eq!(
            settings.parse_methods(),
            Err(ConfigError::InvalidMethod("not a method".into()))
        );
    }

    #[test]
    fn refresh_settings_live_under_swr() {
        let settings: Settings = serde_json::from_str(
            r#"{ "swr": { "refresh": { "deduplicate": false, "timeout": { "type": "Warn", "after": "2s" } } } }"#,
        )
        .unwrap();

        assert!(!settings.swr.refresh.deduplicate);
        assert_eq!(
            settings.swr.refresh.timeout,
            RefreshTimeout::Warn {
                after: Duration::from_secs(2)
            }
        );
    }
}
