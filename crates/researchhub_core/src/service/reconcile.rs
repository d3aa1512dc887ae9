//! One-way replica repair.
//!
//! The source backend is authoritative. Records whose surrogate id is
//! missing on the target are copied; records already present on the target
//! are left untouched even when their fields differ.

use super::ServiceError;
use crate::repo::document_repo::DocumentStore;
use log::info;
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    pub researchers: usize,
    pub projects: usize,
    pub publications: usize,
}

impl ReconcileSummary {
    pub fn total(&self) -> usize {
        self.researchers + self.projects + self.publications
    }
}

/// Copies every record present on `source` but absent from `target`.
///
/// # Errors
/// - Any read or write failure, attributed to the backend that raised it.
pub fn reconcile_replica(
    source: &dyn DocumentStore,
    target: &dyn DocumentStore,
) -> Result<ReconcileSummary, ServiceError> {
    let started_at = Instant::now();
    let from_source = |err| ServiceError::primary(source.backend_name(), err);
    let on_target = |err| ServiceError::primary(target.backend_name(), err);

    let mut summary = ReconcileSummary::default();

    let present: HashSet<_> = target
        .list_researchers()
        .map_err(on_target)?
        .into_iter()
        .map(|researcher| researcher.id)
        .collect();
    for researcher in source.list_researchers().map_err(from_source)? {
        if !present.contains(&researcher.id) {
            target.upsert_researcher(&researcher).map_err(on_target)?;
            summary.researchers += 1;
        }
    }

    let present: HashSet<_> = target
        .list_projects()
        .map_err(on_target)?
        .into_iter()
        .map(|project| project.id)
        .collect();
    for project in source.list_projects().map_err(from_source)? {
        if !present.contains(&project.id) {
            target.upsert_project(&project).map_err(on_target)?;
            summary.projects += 1;
        }
    }

    let present: HashSet<_> = target
        .list_publications()
        .map_err(on_target)?
        .into_iter()
        .map(|publication| publication.id)
        .collect();
    for publication in source.list_publications().map_err(from_source)? {
        if !present.contains(&publication.id) {
            target.upsert_publication(&publication).map_err(on_target)?;
            summary.publications += 1;
        }
    }

    info!(
        "event=reconcile_replica module=service status=ok source={} target={} researchers={} projects={} publications={} duration_ms={}",
        source.backend_name(),
        target.backend_name(),
        summary.researchers,
        summary.projects,
        summary.publications,
        started_at.elapsed().as_millis()
    );
    Ok(summary)
}
