//! Project record.

use super::{require_entries, require_text, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;

/// A research project and the names of its participants.
///
/// Participants are not required to exist as researchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub participants: Vec<String>,
    /// Titles of publications produced by this project.
    #[serde(default)]
    pub publications: Vec<String>,
}

impl Project {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        participants: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            participants,
            publications: Vec::new(),
        }
    }

    /// Attaches publication titles, replacing any previous list.
    pub fn with_publications(mut self, publications: Vec<String>) -> Self {
        self.publications = publications;
        self
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("project", "title", &self.title)?;
        require_entries("project", "participants", &self.participants)?;
        require_entries("project", "publications", &self.publications)?;
        Ok(())
    }
}
