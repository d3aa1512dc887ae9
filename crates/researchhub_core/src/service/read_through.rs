//! Shared cache-aside read path.

use super::ServiceError;
use crate::cache::codec::{self, CachePayload};
use crate::cache::{Cache, CacheError};
use log::{debug, warn};
use std::time::Duration;

/// Where a read-through value came from.
pub(crate) enum Fetched<T> {
    Cached(T),
    Loaded { value: T, backend: String },
    Missing,
}

pub(crate) struct ReadThrough<'a> {
    cache: &'a dyn Cache,
    ttl: Duration,
    module: &'static str,
}

impl<'a> ReadThrough<'a> {
    pub(crate) fn new(cache: &'a dyn Cache, ttl: Duration, module: &'static str) -> Self {
        Self { cache, ttl, module }
    }

    /// Serves `key` from cache, else runs `load` once and stores its result.
    ///
    /// `load` returns the value with the name of the backend that produced
    /// it, or `None` when absent; absent values are not cached.
    pub(crate) fn fetch<T, F>(&self, key: &str, load: F) -> Result<Fetched<T>, ServiceError>
    where
        T: CachePayload,
        F: FnOnce() -> Result<Option<(T, String)>, ServiceError>,
    {
        if let Some(value) = self.read(key) {
            return Ok(Fetched::Cached(value));
        }

        match load()? {
            None => Ok(Fetched::Missing),
            Some((value, backend)) => {
                self.write(key, &value);
                Ok(Fetched::Loaded { value, backend })
            }
        }
    }

    fn read<T: CachePayload>(&self, key: &str) -> Option<T> {
        let raw = match self.cache.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(
                    "event=cache_read module={} status=degraded backend={} error_code=cache_unavailable error={}",
                    self.module,
                    self.cache.backend_name(),
                    err
                );
                return None;
            }
        };

        match codec::decode::<T>(key, &raw) {
            Ok(value) => Some(value),
            Err(CacheError::Malformed { message, .. }) => {
                warn!(
                    "event=cache_read module={} status=malformed backend={} kind={} error={}",
                    self.module,
                    self.cache.backend_name(),
                    T::KIND,
                    message
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=cache_read module={} status=error backend={} error={}",
                    self.module,
                    self.cache.backend_name(),
                    err
                );
                None
            }
        }
    }

    fn write<T: CachePayload>(&self, key: &str, value: &T) {
        let result = codec::encode(key, value)
            .and_then(|raw| self.cache.set_with_expiry(key, &raw, self.ttl));
        match result {
            Ok(()) => debug!(
                "event=cache_write module={} status=ok backend={} kind={} ttl_secs={}",
                self.module,
                self.cache.backend_name(),
                T::KIND,
                self.ttl.as_secs()
            ),
            Err(err) => warn!(
                "event=cache_write module={} status=degraded backend={} kind={} error={}",
                self.module,
                self.cache.backend_name(),
                T::KIND,
                err
            ),
        }
    }
}
