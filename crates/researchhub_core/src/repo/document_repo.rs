//! Document store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide point lookups by surrogate id and by name/title index.
//! - Provide full listings and the participant membership scan.
//! - Persist writes as full-record upserts keyed by surrogate id.
//!
//! # Invariants
//! - Name/title lookups return matches in insertion order.
//! - A re-insert of an existing id replaces the record but keeps its
//!   insertion position.
//! - Project participants keep their operator-given order.

use super::{decode_list, encode_list, ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use crate::model::project::{Project, ProjectId};
use crate::model::publication::{Publication, PublicationId};
use crate::model::researcher::{Researcher, ResearcherId};
use rusqlite::{params, Connection, Row};

const REQUIRED_TABLES: &[&str] = &[
    "researchers",
    "projects",
    "project_participants",
    "publications",
];

const RESEARCHER_SELECT_SQL: &str = "SELECT uuid, name, department, interests FROM researchers";
const PROJECT_SELECT_SQL: &str = "SELECT p.uuid, p.title, p.description, p.publications FROM projects p";
const PUBLICATION_SELECT_SQL: &str =
    "SELECT uuid, title, project, year, authors FROM publications";

/// Repository interface for one document backend.
///
/// All lookups return `Ok(None)`/empty vectors for absent data; errors are
/// reserved for transport and data integrity failures.
pub trait DocumentStore {
    /// Stable backend name used in logs, write targets and error reports.
    fn backend_name(&self) -> &str;

    fn upsert_researcher(&self, researcher: &Researcher) -> RepoResult<()>;
    fn get_researcher(&self, id: ResearcherId) -> RepoResult<Option<Researcher>>;
    fn find_researchers_by_name(&self, name: &str) -> RepoResult<Vec<Researcher>>;
    fn list_researchers(&self) -> RepoResult<Vec<Researcher>>;

    fn upsert_project(&self, project: &Project) -> RepoResult<()>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn find_projects_by_title(&self, title: &str) -> RepoResult<Vec<Project>>;
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    /// Projects listing `name` among their participants.
    fn projects_with_participant(&self, name: &str) -> RepoResult<Vec<Project>>;

    fn upsert_publication(&self, publication: &Publication) -> RepoResult<()>;
    fn get_publication(&self, id: PublicationId) -> RepoResult<Option<Publication>>;
    fn find_publications_by_title(&self, title: &str) -> RepoResult<Vec<Publication>>;
    fn list_publications(&self) -> RepoResult<Vec<Publication>>;
}

/// SQLite-backed document store.
pub struct SqliteDocumentStore<'conn> {
    name: String,
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(name: impl Into<String>, conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self {
            name: name.into(),
            conn,
        })
    }

    fn query_researchers(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Researcher>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut rows = stmt.query(params)?;
        let mut researchers = Vec::new();
        while let Some(row) = rows.next()? {
            researchers.push(parse_researcher_row(row)?);
        }
        Ok(researchers)
    }

    fn query_projects(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Project>> {
        let mut headers = Vec::new();
        {
            let mut stmt = self.conn.prepare_cached(sql)?;
            let mut rows = stmt.query(params)?;
            while let Some(row) = rows.next()? {
                headers.push(parse_project_header(row)?);
            }
        }

        let mut projects = Vec::with_capacity(headers.len());
        for mut project in headers {
            project.participants = self.load_participants(project.id)?;
            project.validate()?;
            projects.push(project);
        }
        Ok(projects)
    }

    fn load_participants(&self, project_id: ProjectId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name FROM project_participants
             WHERE project_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut participants = Vec::new();
        while let Some(row) = rows.next()? {
            participants.push(row.get::<_, String>(0)?);
        }
        Ok(participants)
    }

    fn query_publications(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Publication>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut rows = stmt.query(params)?;
        let mut publications = Vec::new();
        while let Some(row) = rows.next()? {
            publications.push(parse_publication_row(row)?);
        }
        Ok(publications)
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn upsert_researcher(&self, researcher: &Researcher) -> RepoResult<()> {
        researcher.validate()?;
        self.conn.execute(
            "INSERT INTO researchers (uuid, name, department, interests)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (uuid) DO UPDATE SET
                name = excluded.name,
                department = excluded.department,
                interests = excluded.interests;",
            params![
                researcher.id.to_string(),
                researcher.name.as_str(),
                researcher.department.as_str(),
                encode_list(&researcher.interests)?,
            ],
        )?;
        Ok(())
    }

    fn get_researcher(&self, id: ResearcherId) -> RepoResult<Option<Researcher>> {
        let mut found = self.query_researchers(
            &format!("{RESEARCHER_SELECT_SQL} WHERE uuid = ?1;"),
            [id.to_string()],
        )?;
        Ok(found.pop())
    }

    fn find_researchers_by_name(&self, name: &str) -> RepoResult<Vec<Researcher>> {
        self.query_researchers(
            &format!("{RESEARCHER_SELECT_SQL} WHERE name = ?1 ORDER BY seq ASC;"),
            [name],
        )
    }

    fn list_researchers(&self) -> RepoResult<Vec<Researcher>> {
        self.query_researchers(&format!("{RESEARCHER_SELECT_SQL} ORDER BY seq ASC;"), [])
    }

    fn upsert_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;
        let tx = self.conn.unchecked_transaction()?;
        let project_uuid = project.id.to_string();
        tx.execute(
            "INSERT INTO projects (uuid, title, description, publications)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (uuid) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                publications = excluded.publications;",
            params![
                project_uuid,
                project.title.as_str(),
                project.description.as_str(),
                encode_list(&project.publications)?,
            ],
        )?;
        tx.execute(
            "DELETE FROM project_participants WHERE project_uuid = ?1;",
            [project_uuid.as_str()],
        )?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO project_participants (project_uuid, position, name)
                 VALUES (?1, ?2, ?3);",
            )?;
            for (position, name) in project.participants.iter().enumerate() {
                let position = i64::try_from(position).map_err(|_| {
                    RepoError::InvalidData("participant list too long".to_string())
                })?;
                insert.execute(params![project_uuid.as_str(), position, name.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let mut found = self.query_projects(
            &format!("{PROJECT_SELECT_SQL} WHERE p.uuid = ?1;"),
            [id.to_string()],
        )?;
        Ok(found.pop())
    }

    fn find_projects_by_title(&self, title: &str) -> RepoResult<Vec<Project>> {
        self.query_projects(
            &format!("{PROJECT_SELECT_SQL} WHERE p.title = ?1 ORDER BY p.seq ASC;"),
            [title],
        )
    }

    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        self.query_projects(&format!("{PROJECT_SELECT_SQL} ORDER BY p.seq ASC;"), [])
    }

    fn projects_with_participant(&self, name: &str) -> RepoResult<Vec<Project>> {
        self.query_projects(
            &format!(
                "{PROJECT_SELECT_SQL}
                 WHERE EXISTS (
                    SELECT 1 FROM project_participants pp
                    WHERE pp.project_uuid = p.uuid AND pp.name = ?1
                 )
                 ORDER BY p.seq ASC;"
            ),
            [name],
        )
    }

    fn upsert_publication(&self, publication: &Publication) -> RepoResult<()> {
        publication.validate()?;
        self.conn.execute(
            "INSERT INTO publications (uuid, title, project, year, authors)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (uuid) DO UPDATE SET
                title = excluded.title,
                project = excluded.project,
                year = excluded.year,
                authors = excluded.authors;",
            params![
                publication.id.to_string(),
                publication.title.as_str(),
                publication.project.as_deref(),
                publication.year,
                encode_list(&publication.authors)?,
            ],
        )?;
        Ok(())
    }

    fn get_publication(&self, id: PublicationId) -> RepoResult<Option<Publication>> {
        let mut found = self.query_publications(
            &format!("{PUBLICATION_SELECT_SQL} WHERE uuid = ?1;"),
            [id.to_string()],
        )?;
        Ok(found.pop())
    }

    fn find_publications_by_title(&self, title: &str) -> RepoResult<Vec<Publication>> {
        self.query_publications(
            &format!("{PUBLICATION_SELECT_SQL} WHERE title = ?1 ORDER BY seq ASC;"),
            [title],
        )
    }

    fn list_publications(&self) -> RepoResult<Vec<Publication>> {
        self.query_publications(&format!("{PUBLICATION_SELECT_SQL} ORDER BY seq ASC;"), [])
    }
}

fn parse_researcher_row(row: &Row<'_>) -> RepoResult<Researcher> {
    let uuid_text: String = row.get("uuid")?;
    let interests_text: String = row.get("interests")?;
    let researcher = Researcher {
        id: parse_uuid("researchers.uuid", &uuid_text)?,
        name: row.get("name")?,
        department: row.get("department")?,
        interests: decode_list("researchers.interests", &interests_text)?,
    };
    researcher.validate()?;
    Ok(researcher)
}

// Participants are loaded separately; validation runs after they are attached.
fn parse_project_header(row: &Row<'_>) -> RepoResult<Project> {
    let uuid_text: String = row.get("uuid")?;
    let publications_text: String = row.get("publications")?;
    Ok(Project {
        id: parse_uuid("projects.uuid", &uuid_text)?,
        title: row.get("title")?,
        description: row.get("description")?,
        participants: Vec::new(),
        publications: decode_list("projects.publications", &publications_text)?,
    })
}

fn parse_publication_row(row: &Row<'_>) -> RepoResult<Publication> {
    let uuid_text: String = row.get("uuid")?;
    let authors_text: String = row.get("authors")?;
    let publication = Publication {
        id: parse_uuid("publications.uuid", &uuid_text)?,
        title: row.get("title")?,
        authors: decode_list("publications.authors", &authors_text)?,
        project: row.get("project")?,
        year: row.get("year")?,
    };
    publication.validate()?;
    Ok(publication)
}
