//! Key-value cache contracts.
//!
//! # Responsibility
//! - Define the string key/value cache used by read-through services.
//! - Own the versioned payload format stored under cache keys.
//!
//! # Invariants
//! - An entry is live strictly before `set time + ttl`; expired entries are
//!   never returned.
//! - Values are opaque strings to the cache; decoding lives in `codec`.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod codec;
mod sqlite_cache;

pub use sqlite_cache::SqliteCache;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug)]
pub enum CacheError {
    /// Cache backend cannot be reached or failed the request.
    Unavailable(DbError),
    /// Cached value does not decode to the expected payload.
    Malformed { key: String, message: String },
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(err) => write!(f, "cache unavailable: {err}"),
            Self::Malformed { key, message } => {
                write!(f, "malformed cache value under `{key}`: {message}")
            }
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            Self::Malformed { .. } => None,
        }
    }
}

impl From<DbError> for CacheError {
    fn from(value: DbError) -> Self {
        Self::Unavailable(value)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(DbError::Sqlite(value))
    }
}

/// String key/value cache with per-entry expiry.
pub trait Cache {
    fn backend_name(&self) -> &str;

    /// Returns the live value under `key`, if any.
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
}

/// Cache key for a researcher looked up by name.
pub fn researcher_key(name: &str) -> String {
    format!("researcher:{name}")
}
