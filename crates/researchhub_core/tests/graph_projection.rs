use researchhub_core::db::open_db_in_memory;
use researchhub_core::model::project::Project;
use researchhub_core::model::publication::Publication;
use researchhub_core::model::researcher::Researcher;
use researchhub_core::repo::document_repo::{DocumentStore, SqliteDocumentStore};
use researchhub_core::repo::graph_repo::{GraphCounts, GraphStore, NodeRef, SqliteGraphStore};
use researchhub_core::service::graph_projection::GraphProjector;
use researchhub_core::{BackendRole, ServiceError};
use rusqlite::Connection;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn edge_count(conn: &Connection, kind: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM graph_edges WHERE kind = ?1;",
        [kind],
        |row| row.get(0),
    )
    .unwrap()
}

fn seed(store: &dyn DocumentStore) {
    for name in ["A", "B", "C"] {
        store
            .upsert_researcher(&Researcher::new(name, "Lab", Vec::new()))
            .unwrap();
    }
    store
        .upsert_project(
            &Project::new("P", "Shared work", names(&["A", "B"]))
                .with_publications(names(&["Paper"])),
        )
        .unwrap();
    store
        .upsert_publication(
            &Publication::new("Paper", names(&["A", "B"]))
                .for_project("P")
                .published_in(2024),
        )
        .unwrap();
}

#[test]
fn rebuild_derives_every_node_and_edge_kind() {
    let documents_conn = open_db_in_memory().unwrap();
    let graph_conn = open_db_in_memory().unwrap();
    let documents = SqliteDocumentStore::try_new("account-1", &documents_conn).unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    seed(&documents);

    let summary = GraphProjector::new(&graph).rebuild(&documents).unwrap();

    assert_eq!(summary.researchers, 3);
    assert_eq!(summary.projects, 1);
    assert_eq!(summary.publications, 1);
    assert_eq!(summary.edges, 7);
    assert_eq!(graph.counts().unwrap(), GraphCounts { nodes: 5, edges: 7 });
    assert_eq!(edge_count(&graph_conn, "WORKED_ON"), 2);
    assert_eq!(edge_count(&graph_conn, "HAS_PUBLICATION"), 1);
    assert_eq!(edge_count(&graph_conn, "AUTHORED"), 2);
    assert_eq!(edge_count(&graph_conn, "CO_AUTHOR"), 1);
    assert_eq!(edge_count(&graph_conn, "TEAMMATE"), 1);
}

#[test]
fn rebuild_is_repeatable_and_drops_stale_entries() {
    let documents_conn = open_db_in_memory().unwrap();
    let graph_conn = open_db_in_memory().unwrap();
    let documents = SqliteDocumentStore::try_new("account-1", &documents_conn).unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    seed(&documents);
    graph
        .merge_node(&NodeRef::researcher("Stale"), None)
        .unwrap();

    let projector = GraphProjector::new(&graph);
    projector.rebuild(&documents).unwrap();
    let first = graph.counts().unwrap();
    projector.rebuild(&documents).unwrap();

    assert_eq!(graph.counts().unwrap(), first);
    assert!(!graph.contains_node(&NodeRef::researcher("Stale")).unwrap());
}

#[test]
fn edges_to_unknown_researchers_are_skipped() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    projector
        .project_researcher(&Researcher::new("A", "Lab", Vec::new()))
        .unwrap();

    let added = projector
        .project_project(&Project::new("P", "", names(&["A", "Ghost"])), &[])
        .unwrap();

    assert_eq!(added, 1);
    assert!(!graph.contains_node(&NodeRef::researcher("Ghost")).unwrap());
    assert_eq!(graph.counts().unwrap(), GraphCounts { nodes: 2, edges: 1 });
}

#[test]
fn project_projection_links_listed_and_supplied_publications() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    for name in ["A", "B"] {
        projector
            .project_researcher(&Researcher::new(name, "Lab", Vec::new()))
            .unwrap();
    }
    let project = Project::new("P", "", names(&["A", "B"])).with_publications(names(&["Listed"]));
    let supplied = Publication::new("Supplied", names(&["B"])).for_project("P");

    projector.project_project(&project, &[supplied]).unwrap();

    assert!(graph.contains_node(&NodeRef::publication("Listed")).unwrap());
    assert!(graph.contains_node(&NodeRef::publication("Supplied")).unwrap());
    assert_eq!(edge_count(&conn, "HAS_PUBLICATION"), 2);
    assert_eq!(edge_count(&conn, "AUTHORED"), 1);
    assert_eq!(edge_count(&conn, "CO_AUTHOR"), 0);
}

#[test]
fn researcher_properties_are_replaced_on_reprojection() {
    let conn = open_db_in_memory().unwrap();
    let graph = SqliteGraphStore::try_new("graph", &conn).unwrap();
    let projector = GraphProjector::new(&graph);
    let mut researcher = Researcher::new("A", "Lab", vec!["graphs".to_string()]);
    projector.project_researcher(&researcher).unwrap();
    researcher.department = "Institute".to_string();
    projector.project_researcher(&researcher).unwrap();

    let properties: String = conn
        .query_row(
            "SELECT properties FROM graph_nodes WHERE label = 'Researcher' AND key = 'A';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&properties).unwrap();
    assert_eq!(value["department"], "Institute");
    assert_eq!(value["interests"][0], "graphs");
    assert_eq!(graph.counts().unwrap().nodes, 1);
}

#[test]
fn failed_rebuild_keeps_the_previous_graph() {
    let documents_conn = open_db_in_memory().unwrap();
    let graph_conn = open_db_in_memory().unwrap();
    let documents = SqliteDocumentStore::try_new("account-1", &documents_conn).unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    seed(&documents);
    let projector = GraphProjector::new(&graph);
    projector.rebuild(&documents).unwrap();
    graph
        .merge_node(&NodeRef::researcher("Stale"), None)
        .unwrap();
    let before = graph.counts().unwrap();
    graph_conn
        .execute_batch(
            "CREATE TRIGGER reject_projects BEFORE INSERT ON graph_nodes
             WHEN NEW.label = 'Project'
             BEGIN SELECT RAISE(ABORT, 'project nodes rejected'); END;",
        )
        .unwrap();

    let err = projector.rebuild(&documents).unwrap_err();

    assert!(matches!(
        err,
        ServiceError::BackendUnavailable {
            role: BackendRole::Graph,
            ..
        }
    ));
    assert_eq!(graph.counts().unwrap(), before);
    assert!(graph.contains_node(&NodeRef::researcher("Stale")).unwrap());
    assert!(graph.contains_node(&NodeRef::project("P")).unwrap());
    assert_eq!(edge_count(&graph_conn, "TEAMMATE"), 1);
}
