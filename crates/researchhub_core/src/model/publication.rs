//! Publication record.

use super::{require_entries, require_text, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PublicationId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Publication {
    pub id: PublicationId,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Owning project title, when known.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl Publication {
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            authors,
            project: None,
            year: None,
        }
    }

    pub fn for_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn published_in(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("publication", "title", &self.title)?;
        require_entries("publication", "authors", &self.authors)?;
        if let Some(project) = self.project.as_deref() {
            require_text("publication", "project", project)?;
        }
        Ok(())
    }
}
