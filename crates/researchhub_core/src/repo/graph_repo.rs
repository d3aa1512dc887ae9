//! Graph store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the derived relationship index as labeled nodes and typed,
//!   directed edges.
//! - Answer group relationship queries and ranking aggregates in one
//!   statement each.
//!
//! # Invariants
//! - A node is unique per `(label, key)`; an edge is unique per
//!   `(from, to, kind)`.
//! - Edge merges only link nodes that already exist.
//! - Ranking output is ordered by count descending, then name ascending.

use super::{ensure_connection_ready, RepoError, RepoResult};
use log::warn;
use rusqlite::{params, Connection, Rows};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const REQUIRED_TABLES: &[&str] = &["graph_nodes", "graph_edges"];

/// Node label in the relationship index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    Researcher,
    Project,
    Publication,
}

impl NodeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Researcher => "Researcher",
            Self::Project => "Project",
            Self::Publication => "Publication",
        }
    }
}

/// Relationship type carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// Researcher -> Project.
    WorkedOn,
    /// Researcher -> Publication.
    Authored,
    /// Project -> Publication.
    HasPublication,
    /// Researcher -> Researcher, per shared publication.
    CoAuthor,
    /// Researcher -> Researcher, per shared project.
    Teammate,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkedOn => "WORKED_ON",
            Self::Authored => "AUTHORED",
            Self::HasPublication => "HAS_PUBLICATION",
            Self::CoAuthor => "CO_AUTHOR",
            Self::Teammate => "TEAMMATE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "WORKED_ON" => Some(Self::WorkedOn),
            "AUTHORED" => Some(Self::Authored),
            "HAS_PUBLICATION" => Some(Self::HasPublication),
            "CO_AUTHOR" => Some(Self::CoAuthor),
            "TEAMMATE" => Some(Self::Teammate),
            _ => None,
        }
    }

    /// Kinds connecting two researchers directly.
    pub fn peer_kinds() -> &'static [RelationKind] {
        &[Self::CoAuthor, Self::Teammate]
    }
}

impl Display for RelationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a node by label and display key (name or title).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn researcher(name: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::Researcher,
            key: name.into(),
        }
    }

    pub fn project(title: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::Project,
            key: title.into(),
        }
    }

    pub fn publication(title: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::Publication,
            key: title.into(),
        }
    }
}

/// Edge to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSpec {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: RelationKind,
}

/// Researcher-to-researcher edge returned by group queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
}

/// Aggregate used to rank researchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    /// Distinct projects worked on.
    Projects,
    /// Distinct publications authored.
    Publications,
    /// Distinct researchers linked by co-authorship or teamwork.
    Collaborators,
}

impl RankingMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Publications => "publications",
            Self::Collaborators => "collaborators",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "projects" => Some(Self::Projects),
            "publications" => Some(Self::Publications),
            "collaborators" => Some(Self::Collaborators),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankedResearcher {
    pub name: String,
    pub count: u64,
}

/// Two authors and the number of publications they share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollaborationPair {
    /// Lexicographically smaller name of the pair.
    pub first: String,
    pub second: String,
    pub shared_publications: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphCounts {
    pub nodes: u64,
    pub edges: u64,
}

/// Repository interface for the relationship index.
pub trait GraphStore {
    fn backend_name(&self) -> &str;

    /// Creates the node if missing; replaces its properties when given.
    fn merge_node(&self, node: &NodeRef, properties: Option<&serde_json::Value>)
        -> RepoResult<()>;

    fn contains_node(&self, node: &NodeRef) -> RepoResult<bool>;

    /// Merges all edges atomically and returns how many were new.
    ///
    /// Edges whose endpoints do not exist are skipped.
    fn merge_edges(&self, edges: &[EdgeSpec]) -> RepoResult<usize>;

    /// Returns every researcher-to-researcher edge of an allowed kind whose
    /// endpoints are both in `names`.
    fn relationships_within(
        &self,
        names: &[String],
        kinds: &[RelationKind],
    ) -> RepoResult<Vec<Relationship>>;

    fn rank_researchers(&self, metric: RankingMetric, limit: u32)
        -> RepoResult<Vec<RankedResearcher>>;

    fn rank_collaboration_pairs(&self, limit: u32) -> RepoResult<Vec<CollaborationPair>>;

    /// Every `CO_AUTHOR` and `TEAMMATE` edge, ordered by kind, then names.
    fn peer_relationships(&self) -> RepoResult<Vec<Relationship>>;

    /// Names of researchers with a `WORKED_ON` edge to project `title`.
    fn project_members(&self, title: &str) -> RepoResult<Vec<String>>;

    fn counts(&self) -> RepoResult<GraphCounts>;

    /// Removes all nodes and edges.
    fn clear(&self) -> RepoResult<()>;

    /// Runs `work` so that either all of its writes persist or none do.
    fn atomically(&self, work: &mut dyn FnMut() -> RepoResult<()>) -> RepoResult<()>;
}

/// SQLite-backed graph store.
pub struct SqliteGraphStore<'conn> {
    name: String,
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphStore<'conn> {
    pub fn try_new(name: impl Into<String>, conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self {
            name: name.into(),
            conn,
        })
    }
}

impl GraphStore for SqliteGraphStore<'_> {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn merge_node(
        &self,
        node: &NodeRef,
        properties: Option<&serde_json::Value>,
    ) -> RepoResult<()> {
        match properties {
            Some(properties) => {
                let encoded = serde_json::to_string(properties).map_err(|err| {
                    RepoError::InvalidData(format!("cannot encode node properties: {err}"))
                })?;
                self.conn.execute(
                    "INSERT INTO graph_nodes (label, key, properties)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (label, key) DO UPDATE SET properties = excluded.properties;",
                    params![node.label.as_str(), node.key.as_str(), encoded],
                )?;
            }
            None => {
                self.conn.execute(
                    "INSERT OR IGNORE INTO graph_nodes (label, key) VALUES (?1, ?2);",
                    params![node.label.as_str(), node.key.as_str()],
                )?;
            }
        }
        Ok(())
    }

    fn contains_node(&self, node: &NodeRef) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM graph_nodes WHERE label = ?1 AND key = ?2);",
            params![node.label.as_str(), node.key.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn merge_edges(&self, edges: &[EdgeSpec]) -> RepoResult<usize> {
        if edges.is_empty() {
            return Ok(0);
        }

        with_savepoint(self.conn, "merge_edges", || {
            let mut stmt = self.conn.prepare_cached(
                "INSERT OR IGNORE INTO graph_edges (src, dst, kind)
                 SELECT s.id, d.id, ?5
                 FROM graph_nodes s, graph_nodes d
                 WHERE s.label = ?1 AND s.key = ?2
                   AND d.label = ?3 AND d.key = ?4;",
            )?;
            let mut inserted = 0;
            for edge in edges {
                inserted += stmt.execute(params![
                    edge.from.label.as_str(),
                    edge.from.key.as_str(),
                    edge.to.label.as_str(),
                    edge.to.key.as_str(),
                    edge.kind.as_str(),
                ])?;
            }
            Ok(inserted)
        })
    }

    fn relationships_within(
        &self,
        names: &[String],
        kinds: &[RelationKind],
    ) -> RepoResult<Vec<Relationship>> {
        if names.is_empty() || kinds.is_empty() {
            return Ok(Vec::new());
        }

        // Group and kinds travel as two JSON arrays so the statement has a
        // fixed parameter count regardless of group size.
        let members = json_array(names.iter().map(String::as_str))?;
        let wanted = json_array(kinds.iter().map(|kind| kind.as_str()))?;
        let mut stmt = self.conn.prepare_cached(
            "WITH members(name) AS (SELECT DISTINCT value FROM json_each(?1)),
                  wanted(kind) AS (SELECT DISTINCT value FROM json_each(?2))
             SELECT s.key, d.key, e.kind
             FROM graph_edges e
             JOIN graph_nodes s ON s.id = e.src
             JOIN graph_nodes d ON d.id = e.dst
             WHERE s.label = 'Researcher'
               AND d.label = 'Researcher'
               AND s.key IN (SELECT name FROM members)
               AND d.key IN (SELECT name FROM members)
               AND e.kind IN (SELECT kind FROM wanted)
             ORDER BY s.key ASC, d.key ASC, e.kind ASC;",
        )?;
        let rows = stmt.query(params![members, wanted])?;
        collect_relationships(rows)
    }

    fn peer_relationships(&self) -> RepoResult<Vec<Relationship>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT s.key, d.key, e.kind
             FROM graph_edges e
             JOIN graph_nodes s ON s.id = e.src
             JOIN graph_nodes d ON d.id = e.dst
             WHERE e.kind IN ('CO_AUTHOR', 'TEAMMATE')
               AND s.label = 'Researcher'
               AND d.label = 'Researcher'
             ORDER BY e.kind ASC, s.key ASC, d.key ASC;",
        )?;
        let rows = stmt.query([])?;
        collect_relationships(rows)
    }

    fn project_members(&self, title: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT s.key
             FROM graph_edges e
             JOIN graph_nodes s ON s.id = e.src
             JOIN graph_nodes p ON p.id = e.dst
             WHERE e.kind = 'WORKED_ON'
               AND s.label = 'Researcher'
               AND p.label = 'Project'
               AND p.key = ?1
             ORDER BY s.key ASC;",
        )?;
        let mut rows = stmt.query([title])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(row.get(0)?);
        }
        Ok(members)
    }

    fn rank_researchers(
        &self,
        metric: RankingMetric,
        limit: u32,
    ) -> RepoResult<Vec<RankedResearcher>> {
        let sql = match metric {
            RankingMetric::Projects => related_count_sql(RelationKind::WorkedOn, "Project"),
            RankingMetric::Publications => {
                related_count_sql(RelationKind::Authored, "Publication")
            }
            RankingMetric::Collaborators => COLLABORATOR_COUNT_SQL.to_string(),
        };

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut ranked = Vec::new();
        while let Some(row) = rows.next()? {
            ranked.push(RankedResearcher {
                name: row.get(0)?,
                count: count_from_db(row.get(1)?)?,
            });
        }
        Ok(ranked)
    }

    fn rank_collaboration_pairs(&self, limit: u32) -> RepoResult<Vec<CollaborationPair>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT a.key AS first, b.key AS second, COUNT(DISTINCT ea.dst) AS shared
             FROM graph_edges ea
             JOIN graph_edges eb ON eb.dst = ea.dst AND eb.kind = 'AUTHORED' AND eb.src <> ea.src
             JOIN graph_nodes a ON a.id = ea.src
             JOIN graph_nodes b ON b.id = eb.src
             WHERE ea.kind = 'AUTHORED'
               AND a.label = 'Researcher'
               AND b.label = 'Researcher'
               AND a.key < b.key
             GROUP BY a.key, b.key
             ORDER BY shared DESC, first ASC, second ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut pairs = Vec::new();
        while let Some(row) = rows.next()? {
            pairs.push(CollaborationPair {
                first: row.get(0)?,
                second: row.get(1)?,
                shared_publications: count_from_db(row.get(2)?)?,
            });
        }
        Ok(pairs)
    }

    fn counts(&self) -> RepoResult<GraphCounts> {
        let nodes: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM graph_nodes;", [], |row| row.get(0))?;
        let edges: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM graph_edges;", [], |row| row.get(0))?;
        Ok(GraphCounts {
            nodes: count_from_db(nodes)?,
            edges: count_from_db(edges)?,
        })
    }

    fn clear(&self) -> RepoResult<()> {
        self.conn
            .execute_batch("DELETE FROM graph_edges; DELETE FROM graph_nodes;")?;
        Ok(())
    }

    fn atomically(&self, work: &mut dyn FnMut() -> RepoResult<()>) -> RepoResult<()> {
        with_savepoint(self.conn, "graph_batch", work)
    }
}

/// Runs `work` inside a named savepoint, rolling back to it on failure.
///
/// Savepoints nest, so batched writes compose with [`GraphStore::atomically`].
fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    work: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {name};"))?;
    match work() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name};"))?;
            Ok(value)
        }
        Err(err) => {
            let rollback = format!("ROLLBACK TO {name}; RELEASE {name};");
            if let Err(rollback_err) = conn.execute_batch(&rollback) {
                warn!(
                    "event=graph_savepoint module=repo status=error savepoint={} error={}",
                    name, rollback_err
                );
            }
            Err(err)
        }
    }
}

fn collect_relationships(mut rows: Rows<'_>) -> RepoResult<Vec<Relationship>> {
    let mut relationships = Vec::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get(2)?;
        let kind = RelationKind::parse(&kind_text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid edge kind `{kind_text}` in graph_edges.kind"))
        })?;
        relationships.push(Relationship {
            from: row.get(0)?,
            to: row.get(1)?,
            kind,
        });
    }
    Ok(relationships)
}

fn json_array<'a>(values: impl Iterator<Item = &'a str>) -> RepoResult<String> {
    let values: Vec<&str> = values.collect();
    serde_json::to_string(&values)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode query values: {err}")))
}

const COLLABORATOR_COUNT_SQL: &str = "SELECT name, COUNT(DISTINCT peer) AS total
FROM (
    SELECT s.key AS name, d.key AS peer
    FROM graph_edges e
    JOIN graph_nodes s ON s.id = e.src
    JOIN graph_nodes d ON d.id = e.dst
    WHERE e.kind IN ('CO_AUTHOR', 'TEAMMATE')
      AND s.label = 'Researcher' AND d.label = 'Researcher' AND s.id <> d.id
    UNION ALL
    SELECT d.key AS name, s.key AS peer
    FROM graph_edges e
    JOIN graph_nodes s ON s.id = e.src
    JOIN graph_nodes d ON d.id = e.dst
    WHERE e.kind IN ('CO_AUTHOR', 'TEAMMATE')
      AND s.label = 'Researcher' AND d.label = 'Researcher' AND s.id <> d.id
)
GROUP BY name
ORDER BY total DESC, name ASC
LIMIT ?1;";

fn related_count_sql(kind: RelationKind, target_label: &str) -> String {
    format!(
        "SELECT s.key AS name, COUNT(DISTINCT e.dst) AS total
         FROM graph_edges e
         JOIN graph_nodes s ON s.id = e.src
         JOIN graph_nodes d ON d.id = e.dst
         WHERE e.kind = '{}'
           AND s.label = 'Researcher'
           AND d.label = '{}'
         GROUP BY s.key
         ORDER BY total DESC, name ASC
         LIMIT ?1;",
        kind.as_str(),
        target_label
    )
}

fn count_from_db(value: i64) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative aggregate count `{value}`")))
}
