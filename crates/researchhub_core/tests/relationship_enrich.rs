use researchhub_core::db::open_db_in_memory;
use researchhub_core::model::project::Project;
use researchhub_core::model::publication::Publication;
use researchhub_core::model::researcher::Researcher;
use researchhub_core::repo::graph_repo::{
    EdgeSpec, GraphStore, NodeRef, RelationKind, SqliteGraphStore,
};
use researchhub_core::service::enrich_service::{RelationshipEnricher, RelationshipMap};
use researchhub_core::service::graph_projection::GraphProjector;
use researchhub_core::{BackendRole, ServiceError};
use std::collections::BTreeSet;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn members(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn seed_researchers(projector: &GraphProjector<'_>, people: &[&str]) {
    for name in people {
        projector
            .project_researcher(&Researcher::new(*name, "Lab", Vec::new()))
            .unwrap();
    }
}

#[test]
fn shared_project_yields_teammate_bucket_with_both_members() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    seed_researchers(&projector, &["A", "B"]);
    projector
        .project_project(&Project::new("P", "", names(&["A", "B"])), &[])
        .unwrap();

    let map = RelationshipEnricher::new(&graph)
        .enrich(&names(&["A", "B"]))
        .unwrap();

    let mut expected = RelationshipMap::new();
    expected.insert(RelationKind::Teammate, members(&["A", "B"]));
    assert_eq!(map, expected);
}

#[test]
fn enrichment_is_symmetric_in_group_order() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    seed_researchers(&projector, &["A", "B", "C"]);
    projector
        .project_project(
            &Project::new("P", "", names(&["A", "B", "C"])),
            &[Publication::new("Paper", names(&["C", "A"]))],
        )
        .unwrap();
    let enricher = RelationshipEnricher::new(&graph);

    let forward = enricher.enrich(&names(&["A", "C"])).unwrap();
    let reverse = enricher.enrich(&names(&["C", "A"])).unwrap();

    assert_eq!(forward, reverse);
    assert_eq!(forward[&RelationKind::CoAuthor], members(&["A", "C"]));
    assert_eq!(forward[&RelationKind::Teammate], members(&["A", "C"]));
}

#[test]
fn only_edges_between_group_members_are_reported() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    seed_researchers(&projector, &["A", "B", "C"]);
    projector
        .project_project(&Project::new("P", "", names(&["A", "C"])), &[])
        .unwrap();

    let map = RelationshipEnricher::new(&graph)
        .enrich(&names(&["A", "B"]))
        .unwrap();
    assert!(map.is_empty());
}

#[test]
fn small_or_repeated_groups_return_empty_map() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let enricher = RelationshipEnricher::new(&graph);

    assert!(enricher.enrich(&[]).unwrap().is_empty());
    assert!(enricher.enrich(&names(&["A"])).unwrap().is_empty());
    assert!(enricher.enrich(&names(&["A", " A "])).unwrap().is_empty());
}

#[test]
fn allow_list_filters_relationship_kinds() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    seed_researchers(&projector, &["A", "B"]);
    projector
        .project_project(
            &Project::new("P", "", names(&["A", "B"])),
            &[Publication::new("Paper", names(&["A", "B"]))],
        )
        .unwrap();

    let map = RelationshipEnricher::with_kinds(&graph, vec![RelationKind::CoAuthor])
        .enrich(&names(&["A", "B"]))
        .unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map[&RelationKind::CoAuthor], members(&["A", "B"]));
}

#[test]
fn reverse_direction_edges_fill_the_same_bucket() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    for name in ["A", "B"] {
        graph.merge_node(&NodeRef::researcher(name), None).unwrap();
    }
    graph
        .merge_edges(&[EdgeSpec {
            from: NodeRef::researcher("B"),
            to: NodeRef::researcher("A"),
            kind: RelationKind::Teammate,
        }])
        .unwrap();

    let map = RelationshipEnricher::new(&graph)
        .enrich(&names(&["A", "B"]))
        .unwrap();
    assert_eq!(map[&RelationKind::Teammate], members(&["A", "B"]));
}

#[test]
fn graph_failure_is_reported_with_graph_role() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    conn.execute_batch("DROP TABLE graph_edges;").unwrap();

    let err = RelationshipEnricher::new(&graph)
        .enrich(&names(&["A", "B"]))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::BackendUnavailable {
            role: BackendRole::Graph,
            ..
        }
    ));
}

#[test]
fn groups_larger_than_the_bind_limit_are_enriched_in_one_query() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    seed_researchers(&projector, &["A", "B"]);
    projector
        .project_project(&Project::new("P", "", names(&["A", "B"])), &[])
        .unwrap();
    let mut group: Vec<String> = (0..20_000).map(|index| format!("member-{index}")).collect();
    group.push("A".to_string());
    group.push("B".to_string());

    let map = RelationshipEnricher::new(&graph).enrich(&group).unwrap();

    let mut expected = RelationshipMap::new();
    expected.insert(RelationKind::Teammate, members(&["A", "B"]));
    assert_eq!(map, expected);
}
