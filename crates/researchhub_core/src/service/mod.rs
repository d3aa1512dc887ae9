//! Core use-case services.
//!
//! # Responsibility
//! - Compose cache, primary and graph handles into read/write use-cases.
//! - Translate store failures into the error kinds callers act on.
//!
//! # Invariants
//! - "Not found" is `Ok(None)`, never an error.
//! - Cache failures degrade to primary reads; primary and graph failures are
//!   returned to the caller.
//! - Services never hold process-wide handles; every store is injected.

use crate::cache::CacheError;
use crate::model::ModelValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod analytics_service;
pub mod directory_service;
pub mod enrich_service;
pub mod fallback;
pub mod graph_projection;
pub mod lookup_service;
mod read_through;
pub mod reconcile;
pub mod replication;

use replication::ReplicationReport;

const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Expiry applied to cache-aside entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub researcher_ttl: Duration,
    pub analytics_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            researcher_ttl: DEFAULT_TTL,
            analytics_ttl: DEFAULT_TTL,
        }
    }
}

/// Which kind of store a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    Cache,
    Primary,
    Graph,
}

impl Display for BackendRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cache => "cache",
            Self::Primary => "primary",
            Self::Graph => "graph",
        })
    }
}

#[derive(Debug)]
pub enum ServiceError {
    /// A store could not be reached or failed the request.
    BackendUnavailable {
        role: BackendRole,
        backend: String,
        source: RepoError,
    },
    /// A store returned data that fails decoding or validation.
    InvalidData {
        role: BackendRole,
        backend: String,
        source: RepoError,
    },
    /// A cached value failed decoding.
    Malformed { key: String, message: String },
    Validation(ModelValidationError),
    /// The write reached a strict subset of its targets.
    PartialReplication(ReplicationReport),
    /// A write was requested with an empty target set.
    NoTargets,
    /// A write target names no configured backend.
    UnknownBackend(String),
    NoPrimaryBackends,
}

impl ServiceError {
    /// Classifies a repository failure from the named backend.
    pub fn from_repo(role: BackendRole, backend: &str, err: RepoError) -> Self {
        match err {
            RepoError::Validation(err) => Self::Validation(err),
            err @ RepoError::InvalidData(_) => Self::InvalidData {
                role,
                backend: backend.to_string(),
                source: err,
            },
            err => Self::BackendUnavailable {
                role,
                backend: backend.to_string(),
                source: err,
            },
        }
    }

    /// Classifies a cache failure from the named backend.
    pub fn from_cache(backend: &str, err: CacheError) -> Self {
        match err {
            CacheError::Unavailable(err) => Self::BackendUnavailable {
                role: BackendRole::Cache,
                backend: backend.to_string(),
                source: RepoError::Db(err),
            },
            CacheError::Malformed { key, message } => Self::Malformed { key, message },
        }
    }

    pub(crate) fn primary(backend: &str, err: RepoError) -> Self {
        Self::from_repo(BackendRole::Primary, backend, err)
    }

    pub(crate) fn graph(backend: &str, err: RepoError) -> Self {
        Self::from_repo(BackendRole::Graph, backend, err)
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendUnavailable {
                role,
                backend,
                source,
            } => write!(f, "{role} backend `{backend}` unavailable: {source}"),
            Self::InvalidData {
                role,
                backend,
                source,
            } => write!(f, "{role} backend `{backend}` returned bad data: {source}"),
            Self::Malformed { key, message } => {
                write!(f, "malformed cache value under `{key}`: {message}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::PartialReplication(report) => write!(f, "{report}"),
            Self::NoTargets => write!(f, "write requires at least one target backend"),
            Self::UnknownBackend(name) => write!(f, "unknown backend `{name}`"),
            Self::NoPrimaryBackends => write!(f, "at least one primary backend is required"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BackendUnavailable { source, .. } | Self::InvalidData { source, .. } => {
                Some(source)
            }
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for ServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}
