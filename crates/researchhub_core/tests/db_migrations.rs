use researchhub_core::db::migrations::latest_version;
use researchhub_core::db::{open_db, open_db_in_memory, open_db_with, DbError, OpenOptions};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "researchers",
        "projects",
        "project_participants",
        "publications",
        "cache_entries",
        "graph_nodes",
        "graph_edges",
    ] {
        assert_table_exists(&conn, table);
    }
}


#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("account-1.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "researchers");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn memory_sentinel_path_opens_isolated_databases() {
    let first = open_db_with(":memory:", OpenOptions::default()).unwrap();
    let second = open_db_with(":memory:", OpenOptions::default()).unwrap();

    first
        .execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES ('k', 'v', 1);",
            [],
        )
        .unwrap();
    let count: i64 = second
        .query_row("SELECT COUNT(*) FROM cache_entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn foreign_keys_cascade_participants_with_their_project() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO projects (uuid, title, description, publications)
         VALUES ('p-1', 'Atlas', '', '[]');
         INSERT INTO project_participants (project_uuid, position, name)
         VALUES ('p-1', 0, 'Ada');
         DELETE FROM projects WHERE uuid = 'p-1';",
    )
    .unwrap();

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM project_participants;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(remaining, 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
