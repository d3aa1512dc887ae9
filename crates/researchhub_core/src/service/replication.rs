//! Sequential fan-out of one record to several primary backends.
//!
//! # Invariants
//! - Every target is attempted, in order, even after a failure.
//! - Writes are upserts by surrogate id; retrying a write is idempotent.
//! - There is no rollback: a partial outcome leaves the succeeded writes.

use super::ServiceError;
use crate::model::project::Project;
use crate::model::publication::Publication;
use crate::model::researcher::Researcher;
use crate::model::ModelValidationError;
use crate::repo::document_repo::DocumentStore;
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// A record that can be written to a document backend.
pub trait Replicable {
    fn kind(&self) -> &'static str;
    /// Human-facing identity used in reports (name or title).
    fn identity(&self) -> &str;
    fn validate(&self) -> Result<(), ModelValidationError>;
    fn write_to(&self, store: &dyn DocumentStore) -> RepoResult<()>;
}

impl Replicable for Researcher {
    fn kind(&self) -> &'static str {
        "researcher"
    }

    fn identity(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), ModelValidationError> {
        Researcher::validate(self)
    }

    fn write_to(&self, store: &dyn DocumentStore) -> RepoResult<()> {
        store.upsert_researcher(self)
    }
}

impl Replicable for Project {
    fn kind(&self) -> &'static str {
        "project"
    }

    fn identity(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), ModelValidationError> {
        Project::validate(self)
    }

    fn write_to(&self, store: &dyn DocumentStore) -> RepoResult<()> {
        store.upsert_project(self)
    }
}

impl Replicable for Publication {
    fn kind(&self) -> &'static str {
        "publication"
    }

    fn identity(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), ModelValidationError> {
        Publication::validate(self)
    }

    fn write_to(&self, store: &dyn DocumentStore) -> RepoResult<()> {
        store.upsert_publication(self)
    }
}

/// Operator choice of write destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTargets {
    All,
    Only(Vec<String>),
}

impl WriteTargets {
    /// Resolves target names against `backends`, keeping the requested order.
    ///
    /// # Errors
    /// - `NoTargets` when nothing is selected.
    /// - `UnknownBackend` for a name no backend carries.
    pub fn select<'a>(
        &self,
        backends: &[&'a dyn DocumentStore],
    ) -> Result<Vec<&'a dyn DocumentStore>, ServiceError> {
        let selected = match self {
            Self::All => backends.to_vec(),
            Self::Only(names) => {
                let mut selected: Vec<&'a dyn DocumentStore> = Vec::with_capacity(names.len());
                for name in names {
                    let backend = backends
                        .iter()
                        .find(|backend| backend.backend_name() == name)
                        .ok_or_else(|| ServiceError::UnknownBackend(name.clone()))?;
                    if !selected
                        .iter()
                        .any(|chosen| chosen.backend_name() == backend.backend_name())
                    {
                        selected.push(*backend);
                    }
                }
                selected
            }
        };
        if selected.is_empty() {
            return Err(ServiceError::NoTargets);
        }
        Ok(selected)
    }
}

#[derive(Debug)]
pub struct ReplicationFailure {
    pub backend: String,
    pub error: RepoError,
}

/// Per-target outcome of one replicated write.
#[derive(Debug)]
pub struct ReplicationReport {
    /// `<kind> <identity>`, for example `researcher Ada`.
    pub entity: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<ReplicationFailure>,
}

impl ReplicationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_backends(&self) -> Vec<&str> {
        self.failed
            .iter()
            .map(|failure| failure.backend.as_str())
            .collect()
    }

    /// `Ok` when every target succeeded, `PartialReplication` for a strict
    /// subset, otherwise the first failure as `BackendUnavailable`.
    pub fn into_result(mut self) -> Result<ReplicationReport, ServiceError> {
        if self.is_complete() {
            return Ok(self);
        }
        if !self.succeeded.is_empty() {
            return Err(ServiceError::PartialReplication(self));
        }
        let first = self.failed.remove(0);
        Err(ServiceError::primary(&first.backend, first.error))
    }
}

impl Display for ReplicationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} written to [{}]; failed on [",
            self.entity,
            self.succeeded.join(", ")
        )?;
        for (index, failure) in self.failed.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", failure.backend, failure.error)?;
        }
        f.write_str("]")
    }
}

/// Writes `entity` to every target in order.
///
/// # Errors
/// - `Validation` before any write when the record is invalid.
/// - `NoTargets` for an empty target list.
/// - `PartialReplication` when some but not all targets succeeded.
/// - `BackendUnavailable` for the first failure when none succeeded.
pub fn replicate<E>(
    entity: &E,
    targets: &[&dyn DocumentStore],
) -> Result<ReplicationReport, ServiceError>
where
    E: Replicable + ?Sized,
{
    fan_out(entity, targets)?.into_result()
}

/// Writes `entity` to every target and returns the per-target outcome
/// without classifying it.
///
/// # Errors
/// - `Validation` or `NoTargets`; store failures land in the report.
pub fn fan_out<E>(
    entity: &E,
    targets: &[&dyn DocumentStore],
) -> Result<ReplicationReport, ServiceError>
where
    E: Replicable + ?Sized,
{
    entity.validate()?;
    if targets.is_empty() {
        return Err(ServiceError::NoTargets);
    }

    let mut report = ReplicationReport {
        entity: format!("{} {}", entity.kind(), entity.identity()),
        succeeded: Vec::with_capacity(targets.len()),
        failed: Vec::new(),
    };

    for target in targets {
        let started_at = Instant::now();
        let backend = target.backend_name();
        match entity.write_to(*target) {
            Ok(()) => {
                info!(
                    "event=replicate_write module=service status=ok kind={} backend={} duration_ms={}",
                    entity.kind(),
                    backend,
                    started_at.elapsed().as_millis()
                );
                report.succeeded.push(backend.to_string());
            }
            Err(error) => {
                warn!(
                    "event=replicate_write module=service status=error kind={} backend={} duration_ms={} error={}",
                    entity.kind(),
                    backend,
                    started_at.elapsed().as_millis(),
                    error
                );
                report.failed.push(ReplicationFailure {
                    backend: backend.to_string(),
                    error,
                });
            }
        }
    }
    Ok(report)
}
