//! Import error types.

use thiserror::Error;

use crate::infrastructure::importers::PackLoadError;
use crate::infrastructure::ports::RepoError;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Another import or clear holds the lock.
    #[error("An import is already in progress")]
    AlreadyImporting,
    #[error("Failed to load content pack: {0}")]
    Load(#[from] PackLoadError),
    #[error("Storage error: {0}")]
    Repo(#[from] RepoError),
}
