use http::Method;
use recache_core::{CacheKey, KeyError, OptionValue, Request, SharedStore, is_store_like};
use smol_str::SmolStr;

use crate::config::{CacheSettings, ConfigError};

/// Per-request caching rules shared by the plain and SWR enhancers.
#[derive(Debug, Clone)]
pub(crate) struct CachePolicy {
    pub(crate) enabled_by_default: bool,
    pub(crate) cache_flag: SmolStr,
    pub(crate) force_update_flag: SmolStr,
    pub(crate) methods: Vec<Method>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled_by_default: true,
            cache_flag: SmolStr::new_static("cache"),
            force_update_flag: SmolStr::new_static("forceUpdate"),
            methods: vec![Method::GET],
        }
    }
}

impl CachePolicy {
    pub(crate) fn from_settings(settings: &CacheSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled_by_default: settings.enabled_by_default,
            cache_flag: settings.cache_flag.clone(),
            force_update_flag: settings.force_update_flag.clone(),
            methods: settings.parse_methods()?,
        })
    }

    /// The cache flag wins when present, otherwise the default applies.
    pub(crate) fn use_cache(&self, request: &Request) -> bool {
        let enabled = request
            .option(&self.cache_flag)
            .map_or(self.enabled_by_default, OptionValue::is_truthy);
        enabled && self.methods.contains(request.method())
    }

    pub(crate) fn force_update(&self, request: &Request) -> bool {
        request.flag(&self.force_update_flag)
    }

    /// Write methods are cached per body.
    pub(crate) fn key(&self, request: &Request) -> Result<CacheKey, KeyError> {
        CacheKey::from_request(request, !request.is_read())
    }

    pub(crate) fn store<V: 'static>(
        &self,
        request: &Request,
        default: &SharedStore<V>,
    ) -> SharedStore<V> {
        store_override(request, &self.cache_flag).unwrap_or_else(|| default.clone())
    }
}

/// Returns the store carried by the named option, if it holds one for `V`.
pub(crate) fn store_override<V: 'static>(request: &Request, flag: &str) -> Option<SharedStore<V>> {
    request
        .option(flag)
        .filter(|value| is_store_like::<V>(value))
        .and_then(OptionValue::as_store::<V>)
}

#[cfg(test)]
mod tests {
    use recache_core::MapStore;

    use super::*;

    #[test]
    fn cache_flag_overrides_default() {
        let policy = CachePolicy::default();
        assert!(policy.use_cache(&Request::get("/a")));
        assert!(!policy.use_cache(&Request::get("/a").with_option("cache", false)));
        assert!(policy.use_cache(&Request::get("/a").with_option("cache", OptionValue::Null)));

        let policy = CachePolicy {
            enabled_by_default: false,
            ..CachePolicy::default()
        };
        assert!(!policy.use_cache(&Request::get("/a")));
        assert!(policy.use_cache(&Request::get("/a").with_option("cache", true)));
    }

    #[test]
    fn only_configured_methods_are_cached() {
        let policy = CachePolicy::default();
        assert!(!policy.use_cache(&Request::post("/a").with_option("cache", true)));

        let policy = CachePolicy {
            methods: vec![Method::GET, Method::POST],
            ..CachePolicy::default()
        };
        assert!(policy.use_cache(&Request::post("/a")));
    }

    #[test]
    fn store_object_enables_cache_and_overrides_store() {
        let policy = CachePolicy::default();
        let default: SharedStore<u8> = std::sync::Arc::new(MapStore::new());
        let custom = MapStore::<u8>::new();
        let request = Request::get("/a").with_option("cache", OptionValue::store::<u8, _>(custom.clone()));

        assert!(policy.use_cache(&request));
        policy
            .store(&request, &default)
            .set(&CacheKey::from("/a"), 1);
        assert_eq!(custom.len(), 1);
    }

    #[test]
    fn non_store_flag_keeps_default_store() {
        let policy = CachePolicy::default();
        let default = MapStore::<u8>::new();
        let shared: SharedStore<u8> = std::sync::Arc::new(default.clone());
        let request = Request::get("/a").with_option("cache", true);

        policy.store(&request, &shared).set(&CacheKey::from("/a"), 1);
        assert_eq!(default.len(), 1);
    }
}
