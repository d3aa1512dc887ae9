use researchhub_core::cache::SqliteCache;
use researchhub_core::clock::ManualClock;
use researchhub_core::db::open_db_in_memory;
use researchhub_core::model::project::Project;
use researchhub_core::model::publication::Publication;
use researchhub_core::model::researcher::Researcher;
use researchhub_core::repo::document_repo::{DocumentStore, SqliteDocumentStore};
use researchhub_core::repo::graph_repo::SqliteGraphStore;
use researchhub_core::service::reconcile::{reconcile_replica, ReconcileSummary};
use researchhub_core::{CacheSettings, ResearchDirectory, ServiceError};
use std::sync::Arc;

fn seed(store: &dyn DocumentStore) -> Researcher {
    let researcher = Researcher::new("Grace", "Navy", vec!["compilers".to_string()]);
    store.upsert_researcher(&researcher).unwrap();
    store
        .upsert_project(&Project::new("Atlas", "", vec!["Grace".to_string()]))
        .unwrap();
    store
        .upsert_publication(&Publication::new("Atlas I", vec!["Grace".to_string()]))
        .unwrap();
    researcher
}

#[test]
fn missing_records_are_copied_once() {
    let source_conn = open_db_in_memory().unwrap();
    let target_conn = open_db_in_memory().unwrap();
    let source = SqliteDocumentStore::try_new("account-1", &source_conn).unwrap();
    let target = SqliteDocumentStore::try_new("account-2", &target_conn).unwrap();
    seed(&source);

    let first = reconcile_replica(&source, &target).unwrap();
    assert_eq!(
        first,
        ReconcileSummary {
            researchers: 1,
            projects: 1,
            publications: 1,
        }
    );
    assert_eq!(target.list_researchers().unwrap(), source.list_researchers().unwrap());
    assert_eq!(target.list_projects().unwrap(), source.list_projects().unwrap());
    assert_eq!(
        target.list_publications().unwrap(),
        source.list_publications().unwrap()
    );

    let second = reconcile_replica(&source, &target).unwrap();
    assert_eq!(second.total(), 0);
}

#[test]
fn records_already_on_the_target_are_not_overwritten() {
    let source_conn = open_db_in_memory().unwrap();
    let target_conn = open_db_in_memory().unwrap();
    let source = SqliteDocumentStore::try_new("account-1", &source_conn).unwrap();
    let target = SqliteDocumentStore::try_new("account-2", &target_conn).unwrap();
    let researcher = seed(&source);
    let mut diverged = researcher.clone();
    diverged.department = "Harvard".to_string();
    target.upsert_researcher(&diverged).unwrap();

    let summary = reconcile_replica(&source, &target).unwrap();

    assert_eq!(summary.researchers, 0);
    assert_eq!(summary.projects, 1);
    assert_eq!(
        target.get_researcher(researcher.id).unwrap(),
        Some(diverged)
    );
}

#[test]
fn directory_reconciles_from_the_first_backend_by_name() {
    let cache_conn = open_db_in_memory().unwrap();
    let graph_conn = open_db_in_memory().unwrap();
    let conn_a = open_db_in_memory().unwrap();
    let conn_b = open_db_in_memory().unwrap();
    let cache =
        SqliteCache::try_new("cache", &cache_conn, Arc::new(ManualClock::starting_at(0))).unwrap();
    let graph = SqliteGraphStore::try_new("graph", &graph_conn).unwrap();
    let account_1 = SqliteDocumentStore::try_new("account-1", &conn_a).unwrap();
    let account_2 = SqliteDocumentStore::try_new("account-2", &conn_b).unwrap();
    seed(&account_1);
    let directory = ResearchDirectory::new(
        &cache,
        vec![&account_1, &account_2],
        &graph,
        CacheSettings::default(),
    )
    .unwrap();

    assert_eq!(directory.reconcile("account-2").unwrap().total(), 3);
    assert_eq!(account_2.list_researchers().unwrap().len(), 1);
    assert!(matches!(
        directory.reconcile("account-9"),
        Err(ServiceError::UnknownBackend(name)) if name == "account-9"
    ));
}
