//! Errors raised while turning documents into live entities.

use beacon_domain::{DocumentId, EntryType, ScopeDescriptor, ScopeError};
use thiserror::Error;

use crate::infrastructure::ports::RepoError;

/// Failure to wrap one document.
///
/// Scoped to a single entity: batch callers log it and move on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WrapError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("{entry_type} {id} rejected by its factory: {reason}")]
    Rejected {
        id: DocumentId,
        entry_type: EntryType,
        reason: String,
    },

    #[error("document {id} is a {actual}, expected a {expected}")]
    TypeMismatch {
        id: DocumentId,
        expected: EntryType,
        actual: EntryType,
    },

    #[error("document {id} not found")]
    NotFound { id: DocumentId },

    #[error("document {id} lives in {actual}, not {expected}")]
    OutOfScope {
        id: DocumentId,
        expected: ScopeDescriptor,
        actual: ScopeDescriptor,
    },

    #[error("invalid reference at {pointer}: {reason}")]
    BadReference { pointer: String, reason: String },

    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl WrapError {
    pub fn bad_reference(pointer: &str, reason: impl Into<String>) -> Self {
        Self::BadReference {
            pointer: pointer.to_string(),
            reason: reason.into(),
        }
    }
}
