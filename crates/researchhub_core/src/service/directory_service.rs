//! Operator-facing facade over the research registry.
//!
//! # Responsibility
//! - Compose lookup, fallback, replication, projection, enrichment and
//!   analytics into the operations the CLI exposes.
//!
//! # Invariants
//! - The first primary backend is the source of truth for graph rebuilds
//!   and reconciliation.
//! - Records that reached at least one backend are projected into the graph
//!   even when replication was partial.

use super::analytics_service::AnalyticsService;
use super::enrich_service::{RelationshipEnricher, RelationshipMap};
use super::fallback::FallbackResolver;
use super::graph_projection::{GraphProjector, ProjectionSummary};
use super::lookup_service::{LookupSource, ResearcherLookup};
use super::reconcile::{reconcile_replica, ReconcileSummary};
use super::replication::{fan_out, replicate, ReplicationFailure, ReplicationReport, WriteTargets};
use super::{CacheSettings, ServiceError};
use crate::cache::Cache;
use crate::model::project::Project;
use crate::model::publication::Publication;
use crate::model::researcher::Researcher;
use crate::repo::document_repo::DocumentStore;
use crate::repo::graph_repo::{
    CollaborationPair, GraphStore, RankedResearcher, RankingMetric, Relationship,
};
use crate::repo::RepoResult;
use log::{info, warn};

/// Researcher fields supplied by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResearcher {
    pub name: String,
    pub department: String,
    pub interests: Vec<String>,
}

/// Project fields supplied by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub participants: Vec<String>,
    /// Publication titles; missing ones are created with the participants
    /// as authors.
    pub publications: Vec<String>,
}

/// Records held by one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendListing<T> {
    pub backend: String,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearcherProfile {
    pub researcher: Researcher,
    /// Titles of projects listing the researcher, across all backends.
    pub projects: Vec<String>,
    pub source: LookupSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectProfile {
    pub project: Project,
    pub backend: String,
    pub relationships: RelationshipMap,
}

/// A completed write and where it landed.
#[derive(Debug)]
pub struct WriteOutcome<T> {
    pub record: T,
    pub report: ReplicationReport,
}

pub struct ResearchDirectory<'a> {
    cache: &'a dyn Cache,
    primaries: Vec<&'a dyn DocumentStore>,
    graph: &'a dyn GraphStore,
    settings: CacheSettings,
}

impl<'a> ResearchDirectory<'a> {
    /// # Errors
    /// - `NoPrimaryBackends` when `primaries` is empty.
    pub fn new(
        cache: &'a dyn Cache,
        primaries: Vec<&'a dyn DocumentStore>,
        graph: &'a dyn GraphStore,
        settings: CacheSettings,
    ) -> Result<Self, ServiceError> {
        if primaries.is_empty() {
            return Err(ServiceError::NoPrimaryBackends);
        }
        Ok(Self {
            cache,
            primaries,
            graph,
            settings,
        })
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.primaries
            .iter()
            .map(|backend| backend.backend_name())
            .collect()
    }

    pub fn list_researchers(&self) -> Result<Vec<BackendListing<Researcher>>, ServiceError> {
        self.list_each(|store| store.list_researchers())
    }

    pub fn list_projects(&self) -> Result<Vec<BackendListing<Project>>, ServiceError> {
        self.list_each(|store| store.list_projects())
    }

    pub fn list_publications(&self) -> Result<Vec<BackendListing<Publication>>, ServiceError> {
        self.list_each(|store| store.list_publications())
    }

    /// Writes a new researcher to `targets` and merges it into the graph.
    ///
    /// # Errors
    /// - `PartialReplication` after the graph was updated for the backends
    ///   that accepted the write.
    /// - Any other replication or graph failure.
    pub fn add_researcher(
        &self,
        input: NewResearcher,
        targets: &WriteTargets,
    ) -> Result<WriteOutcome<Researcher>, ServiceError> {
        let researcher = Researcher::new(
            input.name.trim(),
            input.department.trim(),
            trimmed(input.interests),
        );
        let selected = targets.select(&self.primaries)?;

        let replicated = settle(replicate(&researcher, &selected))?;
        self.projector().project_researcher(&researcher)?;
        let report = replicated.map_err(ServiceError::PartialReplication)?;

        info!(
            "event=add_researcher module=service status=ok targets={}",
            report.succeeded.len()
        );
        Ok(WriteOutcome {
            record: researcher,
            report,
        })
    }

    /// Writes a new project, creates its missing publications and merges
    /// both into the graph.
    ///
    /// Publications are only created on backends that accepted the project.
    ///
    /// # Errors
    /// - `PartialReplication` for the project when some targets rejected it.
    /// - Otherwise the first publication that did not reach every backend
    ///   holding the project, reported after the graph was updated.
    pub fn add_project(
        &self,
        input: NewProject,
        targets: &WriteTargets,
    ) -> Result<WriteOutcome<Project>, ServiceError> {
        let participants = trimmed(input.participants);
        let publication_titles = trimmed(input.publications);
        let project = Project::new(input.title.trim(), input.description.trim(), participants)
            .with_publications(publication_titles);
        let publications: Vec<Publication> = project
            .publications
            .iter()
            .map(|title| {
                Publication::new(title.as_str(), project.participants.clone())
                    .for_project(project.title.as_str())
            })
            .collect();
        for publication in &publications {
            publication.validate()?;
        }
        let selected = targets.select(&self.primaries)?;

        let replicated = settle(replicate(&project, &selected))?;
        let succeeded = match &replicated {
            Ok(report) | Err(report) => &report.succeeded,
        };
        let written: Vec<&dyn DocumentStore> = selected
            .iter()
            .copied()
            .filter(|store| succeeded.iter().any(|name| name == store.backend_name()))
            .collect();

        let mut pending: Option<ServiceError> = None;
        let mut projected: Vec<Publication> = Vec::with_capacity(publications.len());
        for publication in publications {
            let (stored, outcome) = self.place_publication(&publication, &written)?;
            if let Err(err) = outcome.into_result() {
                warn!(
                    "event=add_publication module=service status=error project={} error={}",
                    project.title, err
                );
                pending.get_or_insert(err);
            }
            // The graph mirrors the record the backends already hold.
            projected.push(stored.unwrap_or(publication));
        }

        self.projector().project_project(&project, &projected)?;

        let report = match replicated {
            Ok(report) => report,
            Err(report) => {
                if let Some(err) = &pending {
                    warn!(
                        "event=add_project module=service status=partial entity={} publication_error={}",
                        report.entity, err
                    );
                }
                return Err(ServiceError::PartialReplication(report));
            }
        };
        if let Some(err) = pending {
            return Err(err);
        }
        info!(
            "event=add_project module=service status=ok targets={} publications={}",
            report.succeeded.len(),
            projected.len()
        );
        Ok(WriteOutcome {
            record: project,
            report,
        })
    }

    /// Creates `publication` on each of `stores` that lacks its title.
    ///
    /// Returns the first already stored record, if any, and a report where
    /// stores already holding the title count as succeeded and failed
    /// lookups count as failed.
    fn place_publication(
        &self,
        publication: &Publication,
        stores: &[&dyn DocumentStore],
    ) -> Result<(Option<Publication>, ReplicationReport), ServiceError> {
        let mut lacking: Vec<&dyn DocumentStore> = Vec::new();
        let mut stored: Option<Publication> = None;
        let mut report = ReplicationReport {
            entity: format!("publication {}", publication.title),
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for store in stores {
            match store.find_publications_by_title(&publication.title) {
                Ok(existing) if existing.is_empty() => lacking.push(*store),
                Ok(mut existing) => {
                    report.succeeded.push(store.backend_name().to_string());
                    stored.get_or_insert_with(|| existing.remove(0));
                }
                Err(error) => report.failed.push(ReplicationFailure {
                    backend: store.backend_name().to_string(),
                    error,
                }),
            }
        }
        if !lacking.is_empty() {
            let written = fan_out(publication, &lacking)?;
            report.succeeded.extend(written.succeeded);
            report.failed.extend(written.failed);
        }
        Ok((stored, report))
    }

    /// Cached researcher plus the titles of projects listing them.
    pub fn researcher_profile(&self, name: &str) -> Result<Option<ResearcherProfile>, ServiceError> {
        let name = name.trim();
        let outcome = self.lookup().resolve_traced(name)?;
        let Some(researcher) = outcome.researcher else {
            return Ok(None);
        };
        let projects = self
            .resolver()
            .projects_with_participant(&researcher.name)?
            .into_iter()
            .map(|project| project.title)
            .collect();
        Ok(Some(ResearcherProfile {
            researcher,
            projects,
            source: outcome.source,
        }))
    }

    /// First matching project in probe order with its participants'
    /// relationships.
    pub fn project_profile(&self, title: &str) -> Result<Option<ProjectProfile>, ServiceError> {
        let Some(resolved) = self.resolver().find_project(title.trim())? else {
            return Ok(None);
        };
        let relationships = RelationshipEnricher::new(self.graph).enrich(&resolved.value.participants)?;
        Ok(Some(ProjectProfile {
            project: resolved.value,
            backend: resolved.backend,
            relationships,
        }))
    }

    pub fn top_researchers(
        &self,
        metric: RankingMetric,
        limit: u32,
    ) -> Result<Vec<RankedResearcher>, ServiceError> {
        self.analytics().top_researchers(metric, limit)
    }

    pub fn top_collaboration_pairs(
        &self,
        limit: u32,
    ) -> Result<Vec<CollaborationPair>, ServiceError> {
        self.analytics().top_collaboration_pairs(limit)
    }

    /// All peer edges in the graph, ordered by kind then names.
    pub fn peer_relationships(&self) -> Result<Vec<Relationship>, ServiceError> {
        self.analytics().peer_relationships()
    }

    /// Members of project `title` as recorded in the graph.
    pub fn project_members(&self, title: &str) -> Result<Vec<String>, ServiceError> {
        self.analytics().project_members(title.trim())
    }

    /// Re-derives the graph from the source-of-truth backend.
    pub fn rebuild_graph(&self) -> Result<ProjectionSummary, ServiceError> {
        self.projector().rebuild(self.source_of_truth())
    }

    /// Copies records missing on `target` from the source-of-truth backend.
    ///
    /// # Errors
    /// - `UnknownBackend` when `target` names no primary backend.
    pub fn reconcile(&self, target: &str) -> Result<ReconcileSummary, ServiceError> {
        let target_store = self
            .primaries
            .iter()
            .copied()
            .find(|store| store.backend_name() == target)
            .ok_or_else(|| ServiceError::UnknownBackend(target.to_string()))?;
        reconcile_replica(self.source_of_truth(), target_store)
    }

    pub fn lookup(&self) -> ResearcherLookup<'a> {
        ResearcherLookup::new(self.cache, self.resolver(), self.settings.researcher_ttl)
    }

    pub fn resolver(&self) -> FallbackResolver<'a> {
        FallbackResolver::new(self.primaries.clone())
    }

    fn analytics(&self) -> AnalyticsService<'a> {
        AnalyticsService::new(self.cache, self.graph, self.settings.analytics_ttl)
    }

    fn projector(&self) -> GraphProjector<'a> {
        GraphProjector::new(self.graph)
    }

    fn source_of_truth(&self) -> &'a dyn DocumentStore {
        self.primaries[0]
    }

    fn list_each<T, F>(&self, list: F) -> Result<Vec<BackendListing<T>>, ServiceError>
    where
        F: Fn(&dyn DocumentStore) -> RepoResult<Vec<T>>,
    {
        self.primaries
            .iter()
            .map(|store| {
                let items =
                    list(*store).map_err(|err| ServiceError::primary(store.backend_name(), err))?;
                Ok(BackendListing {
                    backend: store.backend_name().to_string(),
                    items,
                })
            })
            .collect()
    }
}

/// Splits a replication result into "reached some backend" (`Ok`) and
/// "reached none" (`Err`); the inner result is `Err` for a partial write.
fn settle(
    result: Result<ReplicationReport, ServiceError>,
) -> Result<Result<ReplicationReport, ReplicationReport>, ServiceError> {
    match result {
        Ok(report) => Ok(Ok(report)),
        Err(ServiceError::PartialReplication(report)) => Ok(Err(report)),
        Err(err) => Err(err),
    }
}

fn trimmed(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .collect()
}
