use researchhub_core::cache::{Cache, SqliteCache};
use researchhub_core::clock::ManualClock;
use researchhub_core::db::open_db_in_memory;
use researchhub_core::model::project::Project;
use researchhub_core::model::publication::Publication;
use researchhub_core::model::researcher::Researcher;
use researchhub_core::repo::graph_repo::{
    CollaborationPair, RankedResearcher, RankingMetric, SqliteGraphStore,
};
use researchhub_core::service::analytics_service::{
    top_researchers_key, AnalyticsService, AnalyticsSource,
};
use researchhub_core::service::graph_projection::GraphProjector;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(60);

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn ranked(name: &str, count: u64) -> RankedResearcher {
    RankedResearcher {
        name: name.to_string(),
        count,
    }
}

fn add_project(projector: &GraphProjector<'_>, title: &str, participants: &[&str]) {
    projector
        .project_project(&Project::new(title, "", names(participants)), &[])
        .unwrap();
}

fn seed(projector: &GraphProjector<'_>) {
    for name in ["A", "B", "C"] {
        projector
            .project_researcher(&Researcher::new(name, "Lab", Vec::new()))
            .unwrap();
    }
    add_project(projector, "P1", &["A", "B"]);
    add_project(projector, "P2", &["A"]);
}

fn cache_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM cache_entries;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn rankings_are_cached_until_the_ttl_elapses() {
    let graph_conn = open_db_in_memory().unwrap();
    let cache_conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    let clock = Arc::new(ManualClock::starting_at(0));
    let cache = SqliteCache::try_new("cache", &cache_conn, clock.clone()).unwrap();
    let projector = GraphProjector::new(&graph);
    seed(&projector);
    let analytics = AnalyticsService::new(&cache, &graph, TTL);

    let first = analytics
        .top_researchers_traced(RankingMetric::Projects, 5)
        .unwrap();
    assert_eq!(first.source, AnalyticsSource::Graph);
    assert_eq!(first.rows, vec![ranked("A", 2), ranked("B", 1)]);

    add_project(&projector, "P3", &["B"]);
    add_project(&projector, "P4", &["B"]);

    clock.advance(Duration::from_secs(30));
    let cached = analytics
        .top_researchers_traced(RankingMetric::Projects, 5)
        .unwrap();
    assert_eq!(cached.source, AnalyticsSource::Cache);
    assert_eq!(cached.rows, first.rows);

    clock.advance(Duration::from_secs(31));
    let refreshed = analytics
        .top_researchers_traced(RankingMetric::Projects, 5)
        .unwrap();
    assert_eq!(refreshed.source, AnalyticsSource::Graph);
    assert_eq!(refreshed.rows, vec![ranked("B", 3), ranked("A", 2)]);
}

#[test]
fn zero_limit_returns_empty_without_touching_stores() {
    let graph_conn = open_db_in_memory().unwrap();
    let cache_conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    let cache =
        SqliteCache::try_new("cache", &cache_conn, Arc::new(ManualClock::starting_at(0))).unwrap();
    seed(&GraphProjector::new(&graph));
    graph_conn.execute_batch("DROP TABLE graph_edges;").unwrap();
    let analytics = AnalyticsService::new(&cache, &graph, TTL);

    let outcome = analytics
        .top_researchers_traced(RankingMetric::Projects, 0)
        .unwrap();
    assert!(outcome.rows.is_empty());
    assert_eq!(outcome.source, AnalyticsSource::Skipped);
    assert!(analytics.top_collaboration_pairs(0).unwrap().is_empty());
    assert_eq!(cache_rows(&cache_conn), 0);
}

#[test]
fn limits_are_cached_under_separate_keys() {
    let graph_conn = open_db_in_memory().unwrap();
    let cache_conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    let cache =
        SqliteCache::try_new("cache", &cache_conn, Arc::new(ManualClock::starting_at(0))).unwrap();
    seed(&GraphProjector::new(&graph));
    let analytics = AnalyticsService::new(&cache, &graph, TTL);

    let top_one = analytics.top_researchers(RankingMetric::Projects, 1).unwrap();
    let top_two = analytics.top_researchers(RankingMetric::Projects, 2).unwrap();

    assert_eq!(top_one, vec![ranked("A", 2)]);
    assert_eq!(top_two.len(), 2);
    assert_eq!(cache_rows(&cache_conn), 2);
    assert!(cache
        .get(&top_researchers_key(RankingMetric::Projects, 1))
        .unwrap()
        .is_some());
}

#[test]
fn collaborator_metric_counts_peers_in_either_direction() {
    let graph_conn = open_db_in_memory().unwrap();
    let cache_conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    let cache =
        SqliteCache::try_new("cache", &cache_conn, Arc::new(ManualClock::starting_at(0))).unwrap();
    let projector = GraphProjector::new(&graph);
    seed(&projector);
    projector
        .project_project(
            &Project::new("P5", "", names(&["C"])),
            &[Publication::new("Paper", names(&["C", "A"]))],
        )
        .unwrap();
    let analytics = AnalyticsService::new(&cache, &graph, TTL);

    let rows = analytics
        .top_researchers(RankingMetric::Collaborators, 5)
        .unwrap();
    assert_eq!(rows, vec![ranked("A", 2), ranked("B", 1), ranked("C", 1)]);
}

#[test]
fn collaboration_pairs_rank_by_shared_publications() {
    let graph_conn = open_db_in_memory().unwrap();
    let cache_conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    let cache =
        SqliteCache::try_new("cache", &cache_conn, Arc::new(ManualClock::starting_at(0))).unwrap();
    let projector = GraphProjector::new(&graph);
    seed(&projector);
    projector
        .project_project(
            &Project::new("P1", "", names(&["A", "B"])),
            &[
                Publication::new("Paper 1", names(&["B", "A"])),
                Publication::new("Paper 2", names(&["A", "B"])),
                Publication::new("Paper 3", names(&["B", "C"])),
            ],
        )
        .unwrap();
    let analytics = AnalyticsService::new(&cache, &graph, TTL);

    let pairs = analytics.top_collaboration_pairs(5).unwrap();
    assert_eq!(
        pairs,
        vec![
            CollaborationPair {
                first: "A".to_string(),
                second: "B".to_string(),
                shared_publications: 2,
            },
            CollaborationPair {
                first: "B".to_string(),
                second: "C".to_string(),
                shared_publications: 1,
            },
        ]
    );
    let again = analytics.top_collaboration_pairs_traced(5).unwrap();
    assert_eq!(again.source, AnalyticsSource::Cache);
    assert_eq!(again.rows, pairs);
}

#[test]
fn unusable_cache_entries_fall_back_to_the_graph() {
    let graph_conn = open_db_in_memory().unwrap();
    let cache_conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    let cache =
        SqliteCache::try_new("cache", &cache_conn, Arc::new(ManualClock::starting_at(0))).unwrap();
    seed(&GraphProjector::new(&graph));
    let key = top_researchers_key(RankingMetric::Projects, 5);
    cache
        .set_with_expiry(&key, r#"{"v":1,"kind":"researcher","data":[]}"#, TTL)
        .unwrap();
    let analytics = AnalyticsService::new(&cache, &graph, TTL);

    let outcome = analytics
        .top_researchers_traced(RankingMetric::Projects, 5)
        .unwrap();
    assert_eq!(outcome.source, AnalyticsSource::Graph);
    assert_eq!(outcome.rows.len(), 2);

    cache_conn.execute_batch("DROP TABLE cache_entries;").unwrap();
    let degraded = analytics
        .top_researchers_traced(RankingMetric::Projects, 5)
        .unwrap();
    assert_eq!(degraded.source, AnalyticsSource::Graph);
    assert_eq!(degraded.rows, outcome.rows);
}
