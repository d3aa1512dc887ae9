//! Core domain logic for ResearchHub.
//! Cache-aside reads, replicated writes and graph analytics over
//! injected storage backends.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cache::{Cache, CacheError, SqliteCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, StackConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::project::{Project, ProjectId};
pub use model::publication::{Publication, PublicationId};
pub use model::researcher::{Researcher, ResearcherId};
pub use model::ModelValidationError;
pub use repo::document_repo::{DocumentStore, SqliteDocumentStore};
pub use repo::graph_repo::{GraphStore, RankingMetric, RelationKind, SqliteGraphStore};
pub use repo::{RepoError, RepoResult};
pub use service::directory_service::{NewProject, NewResearcher, ResearchDirectory};
pub use service::replication::WriteTargets;
pub use service::{BackendRole, CacheSettings, ServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
