//! Read-through researcher lookup.
//!
//! # Responsibility
//! - Serve researchers by name from the cache, falling back to primaries.
//! - Populate the cache after a primary hit.
//!
//! # Invariants
//! - At most one fallback resolution per call.
//! - Misses are not cached; a name absent everywhere leaves the cache as is.
//! - Cache failures never fail the lookup.

use super::fallback::FallbackResolver;
use super::read_through::{Fetched, ReadThrough};
use super::ServiceError;
use crate::cache::{codec, researcher_key, Cache};
use crate::model::researcher::Researcher;
use log::info;
use std::time::{Duration, Instant};

const MODULE: &str = "lookup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupSource {
    Cache,
    Primary { backend: String },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    pub researcher: Option<Researcher>,
    pub source: LookupSource,
    pub elapsed: Duration,
}

pub struct ResearcherLookup<'a> {
    cache: &'a dyn Cache,
    resolver: FallbackResolver<'a>,
    ttl: Duration,
}

impl<'a> ResearcherLookup<'a> {
    pub fn new(cache: &'a dyn Cache, resolver: FallbackResolver<'a>, ttl: Duration) -> Self {
        Self {
            cache,
            resolver,
            ttl,
        }
    }

    /// Returns the researcher called `name`, or `None` when no backend has one.
    ///
    /// # Errors
    /// - A primary backend failed while probing.
    pub fn resolve(&self, name: &str) -> Result<Option<Researcher>, ServiceError> {
        Ok(self.resolve_traced(name)?.researcher)
    }

    /// Like [`Self::resolve`], also reporting where the answer came from.
    pub fn resolve_traced(&self, name: &str) -> Result<LookupOutcome, ServiceError> {
        let started_at = Instant::now();
        let key = researcher_key(name);

        let fetched = ReadThrough::new(self.cache, self.ttl, MODULE).fetch(&key, || {
            Ok(self
                .resolver
                .find_researcher(name)?
                .map(|resolved| (resolved.value, resolved.backend)))
        })?;

        let (researcher, source) = match fetched {
            Fetched::Cached(researcher) => (Some(researcher), LookupSource::Cache),
            Fetched::Loaded { value, backend } => (Some(value), LookupSource::Primary { backend }),
            Fetched::Missing => (None, LookupSource::NotFound),
        };

        let elapsed = started_at.elapsed();
        info!(
            "event=researcher_lookup module={} status=ok source={} duration_us={}",
            MODULE,
            match &source {
                LookupSource::Cache => "cache",
                LookupSource::Primary { backend } => backend.as_str(),
                LookupSource::NotFound => "none",
            },
            elapsed.as_micros()
        );

        Ok(LookupOutcome {
            researcher,
            source,
            elapsed,
        })
    }

    /// Reads the cached snapshot for `name` without touching any primary.
    ///
    /// # Errors
    /// - `BackendUnavailable` with the cache role when the cache fails.
    /// - `Malformed` when the stored value does not decode.
    pub fn cached(&self, name: &str) -> Result<Option<Researcher>, ServiceError> {
        let key = researcher_key(name);
        let backend = self.cache.backend_name();
        let Some(raw) = self
            .cache
            .get(&key)
            .map_err(|err| ServiceError::from_cache(backend, err))?
        else {
            return Ok(None);
        };
        codec::decode(&key, &raw)
            .map(Some)
            .map_err(|err| ServiceError::from_cache(backend, err))
    }
}
