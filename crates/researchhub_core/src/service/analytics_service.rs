//! Cache-aside ranking queries over the relationship index.

use super::read_through::{Fetched, ReadThrough};
use super::ServiceError;
use crate::cache::codec::CachePayload;
use crate::cache::Cache;
use crate::repo::graph_repo::{
    CollaborationPair, GraphStore, RankedResearcher, RankingMetric, Relationship,
};
use crate::repo::RepoResult;
use log::info;
use std::time::{Duration, Instant};

const MODULE: &str = "analytics";

pub fn top_researchers_key(metric: RankingMetric, limit: u32) -> String {
    format!("analytics:top_researchers:{}:{limit}", metric.as_str())
}

pub fn top_pairs_key(limit: u32) -> String {
    format!("analytics:top_pairs:{limit}")
}

/// Where an analytics answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsSource {
    Cache,
    Graph,
    /// `limit` was zero; nothing was consulted.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsOutcome<T> {
    pub rows: Vec<T>,
    pub source: AnalyticsSource,
    pub elapsed: Duration,
}

pub struct AnalyticsService<'a> {
    cache: &'a dyn Cache,
    graph: &'a dyn GraphStore,
    ttl: Duration,
}

impl<'a> AnalyticsService<'a> {
    pub fn new(cache: &'a dyn Cache, graph: &'a dyn GraphStore, ttl: Duration) -> Self {
        Self { cache, graph, ttl }
    }

    /// Top `limit` researchers by `metric`, count descending then name.
    pub fn top_researchers(
        &self,
        metric: RankingMetric,
        limit: u32,
    ) -> Result<Vec<RankedResearcher>, ServiceError> {
        Ok(self.top_researchers_traced(metric, limit)?.rows)
    }

    pub fn top_researchers_traced(
        &self,
        metric: RankingMetric,
        limit: u32,
    ) -> Result<AnalyticsOutcome<RankedResearcher>, ServiceError> {
        self.cache_aside(
            "top_researchers",
            &top_researchers_key(metric, limit),
            limit,
            |graph| graph.rank_researchers(metric, limit),
        )
    }

    /// Top `limit` author pairs by number of shared publications.
    pub fn top_collaboration_pairs(
        &self,
        limit: u32,
    ) -> Result<Vec<CollaborationPair>, ServiceError> {
        Ok(self.top_collaboration_pairs_traced(limit)?.rows)
    }

    pub fn top_collaboration_pairs_traced(
        &self,
        limit: u32,
    ) -> Result<AnalyticsOutcome<CollaborationPair>, ServiceError> {
        self.cache_aside("top_pairs", &top_pairs_key(limit), limit, |graph| {
            graph.rank_collaboration_pairs(limit)
        })
    }

    /// Every co-author and teammate edge in the graph. Not cached.
    pub fn peer_relationships(&self) -> Result<Vec<Relationship>, ServiceError> {
        self.uncached("peer_relationships", |graph| graph.peer_relationships())
    }

    /// Researchers linked to project `title` in the graph. Not cached.
    pub fn project_members(&self, title: &str) -> Result<Vec<String>, ServiceError> {
        self.uncached("project_members", |graph| graph.project_members(title))
    }

    fn uncached<T, F>(&self, query: &'static str, run: F) -> Result<Vec<T>, ServiceError>
    where
        F: FnOnce(&dyn GraphStore) -> RepoResult<Vec<T>>,
    {
        let started_at = Instant::now();
        let rows =
            run(self.graph).map_err(|err| ServiceError::graph(self.graph.backend_name(), err))?;
        info!(
            "event=analytics_query module={} status=ok query={} source=graph rows={} duration_us={}",
            MODULE,
            query,
            rows.len(),
            started_at.elapsed().as_micros()
        );
        Ok(rows)
    }

    fn cache_aside<T, F>(
        &self,
        query: &'static str,
        key: &str,
        limit: u32,
        run: F,
    ) -> Result<AnalyticsOutcome<T>, ServiceError>
    where
        Vec<T>: CachePayload,
        F: FnOnce(&dyn GraphStore) -> RepoResult<Vec<T>>,
    {
        let started_at = Instant::now();
        if limit == 0 {
            return Ok(AnalyticsOutcome {
                rows: Vec::new(),
                source: AnalyticsSource::Skipped,
                elapsed: started_at.elapsed(),
            });
        }

        let graph = self.graph;
        let fetched = ReadThrough::new(self.cache, self.ttl, MODULE).fetch(key, || {
            let rows = run(graph)
                .map_err(|err| ServiceError::graph(graph.backend_name(), err))?;
            Ok(Some((rows, graph.backend_name().to_string())))
        })?;

        let (rows, source) = match fetched {
            Fetched::Cached(rows) => (rows, AnalyticsSource::Cache),
            Fetched::Loaded { value, .. } => (value, AnalyticsSource::Graph),
            Fetched::Missing => (Vec::new(), AnalyticsSource::Graph),
        };
        let elapsed = started_at.elapsed();
        info!(
            "event=analytics_query module={} status=ok query={} source={} rows={} duration_us={}",
            MODULE,
            query,
            match source {
                AnalyticsSource::Cache => "cache",
                AnalyticsSource::Graph => "graph",
                AnalyticsSource::Skipped => "skipped",
            },
            rows.len(),
            elapsed.as_micros()
        );
        Ok(AnalyticsOutcome {
            rows,
            source,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{top_pairs_key, top_researchers_key};
    use crate::repo::graph_repo::RankingMetric;

    #[test]
    fn keys_carry_metric_and_limit() {
        assert_eq!(
            top_researchers_key(RankingMetric::Projects, 5),
            "analytics:top_researchers:projects:5"
        );
        assert_eq!(top_pairs_key(3), "analytics:top_pairs:3");
    }
}
