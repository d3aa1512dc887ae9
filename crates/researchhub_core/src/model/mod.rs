//! Domain model for researchers, projects and publications.
//!
//! # Responsibility
//! - Define the canonical records stored by every document backend.
//! - Provide write/read validation shared by repositories and the cache codec.
//!
//! # Invariants
//! - Every record is identified by a stable surrogate UUID; names and titles
//!   are display identities and may collide.
//! - Relationships between records reference names/titles, not ids.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod project;
pub mod publication;
pub mod researcher;

/// Validation failure for any domain record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// A required text field is empty after trim.
    BlankField {
        entity: &'static str,
        field: &'static str,
    },
    /// A list field contains an empty entry.
    BlankListEntry {
        entity: &'static str,
        field: &'static str,
        index: usize,
    },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField { entity, field } => {
                write!(f, "{entity}.{field} must not be blank")
            }
            Self::BlankListEntry {
                entity,
                field,
                index,
            } => write!(f, "{entity}.{field}[{index}] must not be blank"),
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn require_text(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField { entity, field });
    }
    Ok(())
}

pub(crate) fn require_entries(
    entity: &'static str,
    field: &'static str,
    values: &[String],
) -> Result<(), ModelValidationError> {
    match values.iter().position(|value| value.trim().is_empty()) {
        Some(index) => Err(ModelValidationError::BlankListEntry {
            entity,
            field,
            index,
        }),
        None => Ok(()),
    }
}

/// Splits comma separated operator input into trimmed, non-empty entries.
///
/// Order is preserved; duplicates are kept.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
