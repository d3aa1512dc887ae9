//! Researcher record.
//!
//! # Invariants
//! - `id` is stable and never reused for another researcher.
//! - `name` is the lookup key for cache and graph, but not unique.

use super::{require_entries, require_text, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surrogate identifier for researchers.
pub type ResearcherId = Uuid;

/// A researcher as stored in a document backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Researcher {
    /// Rendered as a hyphenated string on the wire.
    pub id: ResearcherId,
    pub name: String,
    pub department: String,
    /// Ordered as entered by the operator.
    #[serde(default)]
    pub interests: Vec<String>,
}

impl Researcher {
    /// Creates a researcher with a generated id.
    pub fn new(
        name: impl Into<String>,
        department: impl Into<String>,
        interests: Vec<String>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), name, department, interests)
    }

    /// Creates a researcher with a caller-provided id.
    ///
    /// Used when the same record is replicated to several backends.
    pub fn with_id(
        id: ResearcherId,
        name: impl Into<String>,
        department: impl Into<String>,
        interests: Vec<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            department: department.into(),
            interests,
        }
    }

    /// Validates required fields.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("researcher", "name", &self.name)?;
        require_entries("researcher", "interests", &self.interests)?;
        Ok(())
    }
}
