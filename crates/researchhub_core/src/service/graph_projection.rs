//! Derivation of the relationship index from document records.
//!
//! # Responsibility
//! - Rebuild the whole graph from one document backend.
//! - Merge single records into the graph after writes.
//!
//! # Invariants
//! - A rebuild replaces the graph as a whole; a failed rebuild leaves the
//!   previous graph in place.
//! - Each edge group is merged atomically.
//! - Peer edges are emitted once per unordered pair, from the earlier name
//!   in list order to the later one.
//! - Edges never create researcher nodes; links to unknown people are
//!   dropped.

use super::ServiceError;
use crate::model::project::Project;
use crate::model::publication::Publication;
use crate::model::researcher::Researcher;
use crate::repo::document_repo::DocumentStore;
use crate::repo::graph_repo::{EdgeSpec, GraphStore, NodeRef, RelationKind};
use crate::repo::{RepoError, RepoResult};
use log::{error, info};
use serde_json::json;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectionSummary {
    pub researchers: usize,
    pub projects: usize,
    pub publications: usize,
    /// Edges newly merged.
    pub edges: usize,
}

pub struct GraphProjector<'a> {
    graph: &'a dyn GraphStore,
}

impl<'a> GraphProjector<'a> {
    pub fn new(graph: &'a dyn GraphStore) -> Self {
        Self { graph }
    }

    /// Clears the graph and re-derives it from `source`.
    ///
    /// # Errors
    /// - Reading `source` fails (primary role) or any graph write fails.
    pub fn rebuild(&self, source: &dyn DocumentStore) -> Result<ProjectionSummary, ServiceError> {
        let started_at = Instant::now();
        let read = |err| ServiceError::primary(source.backend_name(), err);
        let researchers = source.list_researchers().map_err(read)?;
        let projects = source.list_projects().map_err(read)?;
        let publications = source.list_publications().map_err(read)?;

        let result = self.write_all(&researchers, &projects, &publications);
        match &result {
            Ok(summary) => info!(
                "event=graph_rebuild module=service status=ok source={} graph={} researchers={} projects={} publications={} edges={} duration_ms={}",
                source.backend_name(),
                self.graph.backend_name(),
                summary.researchers,
                summary.projects,
                summary.publications,
                summary.edges,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=graph_rebuild module=service status=error source={} graph={} error={}",
                source.backend_name(),
                self.graph.backend_name(),
                err
            ),
        }
        result
    }

    /// Merges a researcher node carrying department and interests.
    pub fn project_researcher(&self, researcher: &Researcher) -> Result<(), ServiceError> {
        self.merge_researcher(researcher).map_err(|err| self.fail(err))
    }

    /// Merges a project, its publications and the edges to known researchers.
    ///
    /// Returns the number of new edges.
    pub fn project_project(
        &self,
        project: &Project,
        publications: &[Publication],
    ) -> Result<usize, ServiceError> {
        self.merge_project(project, publications)
            .map_err(|err| self.fail(err))
    }

    fn write_all(
        &self,
        researchers: &[Researcher],
        projects: &[Project],
        publications: &[Publication],
    ) -> Result<ProjectionSummary, ServiceError> {
        let mut summary = ProjectionSummary {
            researchers: researchers.len(),
            projects: projects.len(),
            publications: publications.len(),
            edges: 0,
        };
        let mut run = || -> RepoResult<()> {
            self.graph.clear()?;
            for researcher in researchers {
                self.merge_researcher(researcher)?;
            }

            for publication in publications {
                self.merge_publication(publication)?;
            }

            let mut edges = 0;
            for project in projects {
                // Linked both ways: titles the project lists and
                // publications naming the project.
                let owned: Vec<Publication> = publications
                    .iter()
                    .filter(|publication| {
                        publication.project.as_deref() == Some(project.title.as_str())
                            || project.publications.contains(&publication.title)
                    })
                    .cloned()
                    .collect();
                edges += self.merge_project(project, &owned)?;
            }
            // Publications outside any project still carry authorship.
            edges += self.graph.merge_edges(&authorship_edges(publications))?;
            summary.edges = edges;
            Ok(())
        };
        self.graph
            .atomically(&mut run)
            .map_err(|err| self.fail(err))?;
        Ok(summary)
    }

    fn merge_researcher(&self, researcher: &Researcher) -> RepoResult<()> {
        let properties = json!({
            "department": researcher.department,
            "interests": researcher.interests,
        });
        self.graph
            .merge_node(&NodeRef::researcher(researcher.name.as_str()), Some(&properties))
    }

    fn merge_publication(&self, publication: &Publication) -> RepoResult<()> {
        let properties = json!({ "year": publication.year });
        self.graph
            .merge_node(&NodeRef::publication(publication.title.as_str()), Some(&properties))
    }

    fn merge_project(&self, project: &Project, publications: &[Publication]) -> RepoResult<usize> {
        let project_node = NodeRef::project(project.title.as_str());
        let properties = json!({ "description": project.description });
        self.graph.merge_node(&project_node, Some(&properties))?;

        let mut titles: Vec<&str> = project.publications.iter().map(String::as_str).collect();
        for publication in publications {
            self.merge_publication(publication)?;
            if !titles.contains(&publication.title.as_str()) {
                titles.push(publication.title.as_str());
            }
        }
        for title in &titles {
            self.graph.merge_node(&NodeRef::publication(*title), None)?;
        }

        let mut edges: Vec<EdgeSpec> = project
            .participants
            .iter()
            .map(|name| EdgeSpec {
                from: NodeRef::researcher(name.as_str()),
                to: project_node.clone(),
                kind: RelationKind::WorkedOn,
            })
            .collect();
        edges.extend(titles.iter().map(|title| EdgeSpec {
            from: project_node.clone(),
            to: NodeRef::publication(*title),
            kind: RelationKind::HasPublication,
        }));
        edges.extend(pair_edges(&project.participants, RelationKind::Teammate));
        edges.extend(authorship_edges(publications));

        self.graph.merge_edges(&edges)
    }

    fn fail(&self, err: RepoError) -> ServiceError {
        ServiceError::graph(self.graph.backend_name(), err)
    }
}

/// `AUTHORED` and `CO_AUTHOR` edges for each publication.
fn authorship_edges(publications: &[Publication]) -> Vec<EdgeSpec> {
    let mut edges = Vec::new();
    for publication in publications {
        let publication_node = NodeRef::publication(publication.title.as_str());
        edges.extend(publication.authors.iter().map(|author| EdgeSpec {
            from: NodeRef::researcher(author.as_str()),
            to: publication_node.clone(),
            kind: RelationKind::Authored,
        }));
        edges.extend(pair_edges(&publication.authors, RelationKind::CoAuthor));
    }
    edges
}

/// One edge per unordered pair of distinct names, earlier name first.
fn pair_edges(names: &[String], kind: RelationKind) -> Vec<EdgeSpec> {
    let mut distinct: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        if !distinct.contains(&name.as_str()) {
            distinct.push(name.as_str());
        }
    }

    let mut edges = Vec::new();
    for (index, first) in distinct.iter().enumerate() {
        for second in &distinct[index + 1..] {
            edges.push(EdgeSpec {
                from: NodeRef::researcher(*first),
                to: NodeRef::researcher(*second),
                kind,
            });
        }
    }
    edges
}
