use thiserror::Error;

use crate::store::StoreError;

/// Failure kinds surfaced by the core operations.
///
/// None of these are retried inside the crate. Callers receive the kind through
/// [`CoreError::code`] and decide whether to resubmit.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("permission denied: {action} requires {required}")]
    PermissionDenied {
        action: &'static str,
        required: &'static str,
    },

    #[error("no students found for degree={degree_id} stream={stream_id} batch={batch_id}")]
    NoMatchingStudents {
        degree_id: String,
        stream_id: String,
        batch_id: String,
    },

    #[error("fetch failed with {} id(s) unresolved: {source}", unresolved.len())]
    PartialFetchFailure {
        unresolved: Vec<String>,
        #[source]
        source: StoreError,
    },

    #[error("atomic batch rejected: {source}")]
    AtomicCommitFailure {
        #[source]
        source: StoreError,
    },

    #[error("{kind} {id} not found in catalog")]
    UnknownCatalogEntry { kind: &'static str, id: String },

    #[error("students not in group {group_id}: {}", student_ids.join(", "))]
    UnknownStudents {
        group_id: String,
        student_ids: Vec<String>,
    },

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::PermissionDenied { .. } => "permission_denied",
            CoreError::NoMatchingStudents { .. } => "no_matching_students",
            CoreError::PartialFetchFailure { .. } => "partial_fetch_failure",
            CoreError::AtomicCommitFailure { .. } => "atomic_commit_failure",
            CoreError::UnknownCatalogEntry { .. } => "unknown_catalog_entry",
            CoreError::UnknownStudents { .. } => "unknown_students",
            CoreError::NotFound { .. } => "not_found",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::Store(_) => "store_error",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
