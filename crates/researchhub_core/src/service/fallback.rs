//! Ordered probing of primary document backends.
//!
//! # Responsibility
//! - Try backends in their configured order and stop at the first hit.
//! - Report which backend answered.
//!
//! # Invariants
//! - Probe order is fixed at construction.
//! - A backend failure ends the probe; later backends are not consulted.
//! - Among duplicates inside one backend the earliest-inserted record wins.

use super::ServiceError;
use crate::model::project::Project;
use crate::model::publication::Publication;
use crate::model::researcher::Researcher;
use crate::repo::document_repo::DocumentStore;
use crate::repo::RepoResult;
use log::warn;
use std::collections::HashSet;

/// A value together with the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub backend: String,
}

#[derive(Clone)]
pub struct FallbackResolver<'a> {
    backends: Vec<&'a dyn DocumentStore>,
}

impl<'a> FallbackResolver<'a> {
    pub fn new(backends: Vec<&'a dyn DocumentStore>) -> Self {
        Self { backends }
    }

    /// Backends in probe order.
    pub fn backends(&self) -> &[&'a dyn DocumentStore] {
        &self.backends
    }

    /// Runs `probe` against each backend until one returns a value.
    ///
    /// # Errors
    /// - The first probe failure, attributed to the backend that raised it.
    pub fn resolve_across<T, F>(&self, mut probe: F) -> Result<Option<Resolved<T>>, ServiceError>
    where
        F: FnMut(&dyn DocumentStore) -> RepoResult<Option<T>>,
    {
        for backend in &self.backends {
            let backend_name = backend.backend_name();
            match probe(*backend) {
                Ok(Some(value)) => {
                    return Ok(Some(Resolved {
                        value,
                        backend: backend_name.to_string(),
                    }))
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "event=fallback_probe module=service status=error backend={} error={}",
                        backend_name, err
                    );
                    return Err(ServiceError::primary(backend_name, err));
                }
            }
        }
        Ok(None)
    }

    pub fn find_researcher(
        &self,
        name: &str,
    ) -> Result<Option<Resolved<Researcher>>, ServiceError> {
        self.resolve_across(|store| {
            let matches = store.find_researchers_by_name(name)?;
            Ok(earliest(store.backend_name(), "researcher", matches))
        })
    }

    pub fn find_project(&self, title: &str) -> Result<Option<Resolved<Project>>, ServiceError> {
        self.resolve_across(|store| {
            let matches = store.find_projects_by_title(title)?;
            Ok(earliest(store.backend_name(), "project", matches))
        })
    }

    pub fn find_publication(
        &self,
        title: &str,
    ) -> Result<Option<Resolved<Publication>>, ServiceError> {
        self.resolve_across(|store| {
            let matches = store.find_publications_by_title(title)?;
            Ok(earliest(store.backend_name(), "publication", matches))
        })
    }

    /// Collects projects listing `name` as a participant from every backend.
    ///
    /// Replicated projects are reported once, from the first backend in
    /// probe order that holds them.
    pub fn projects_with_participant(&self, name: &str) -> Result<Vec<Project>, ServiceError> {
        let mut seen = HashSet::new();
        let mut projects = Vec::new();
        for backend in &self.backends {
            let found = backend
                .projects_with_participant(name)
                .map_err(|err| ServiceError::primary(backend.backend_name(), err))?;
            projects.extend(found.into_iter().filter(|project| seen.insert(project.id)));
        }
        Ok(projects)
    }
}

/// Picks the first match; stores return matches in insertion order.
fn earliest<T>(backend: &str, entity: &'static str, matches: Vec<T>) -> Option<T> {
    if matches.len() > 1 {
        warn!(
            "event=duplicate_name module=service status=resolved backend={} entity={} matches={}",
            backend,
            entity,
            matches.len()
        );
    }
    matches.into_iter().next()
}
