//! Relationship aggregation for a group of researchers.

use super::ServiceError;
use crate::repo::graph_repo::{GraphStore, RelationKind};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Relationship kind mapped to every group member taking part in it.
pub type RelationshipMap = BTreeMap<RelationKind, BTreeSet<String>>;

pub struct RelationshipEnricher<'a> {
    graph: &'a dyn GraphStore,
    kinds: Vec<RelationKind>,
}

impl<'a> RelationshipEnricher<'a> {
    /// Enricher over the researcher-to-researcher kinds.
    pub fn new(graph: &'a dyn GraphStore) -> Self {
        Self::with_kinds(graph, RelationKind::peer_kinds().to_vec())
    }

    pub fn with_kinds(graph: &'a dyn GraphStore, kinds: Vec<RelationKind>) -> Self {
        Self { graph, kinds }
    }

    /// Returns, per allowed kind, the members linked by at least one edge of
    /// that kind to another member.
    ///
    /// Both endpoints of a matching edge are recorded, so the result does not
    /// depend on edge direction. Runs a single graph query.
    pub fn enrich(&self, group: &[String]) -> Result<RelationshipMap, ServiceError> {
        let members = distinct_members(group);
        let mut map = RelationshipMap::new();
        if members.len() < 2 || self.kinds.is_empty() {
            return Ok(map);
        }

        let started_at = Instant::now();
        let edges = self
            .graph
            .relationships_within(&members, &self.kinds)
            .map_err(|err| ServiceError::graph(self.graph.backend_name(), err))?;
        for edge in edges {
            let entry = map.entry(edge.kind).or_default();
            entry.insert(edge.from);
            entry.insert(edge.to);
        }

        debug!(
            "event=enrich_group module=service status=ok backend={} members={} kinds={} duration_ms={}",
            self.graph.backend_name(),
            members.len(),
            map.len(),
            started_at.elapsed().as_millis()
        );
        Ok(map)
    }
}

fn distinct_members(group: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    group
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::distinct_members;

    #[test]
    fn distinct_members_trims_and_keeps_first_occurrence() {
        let group = vec![
            " Ada ".to_string(),
            "Grace".to_string(),
            "Ada".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(distinct_members(&group), vec!["Ada", "Grace"]);
    }
}
