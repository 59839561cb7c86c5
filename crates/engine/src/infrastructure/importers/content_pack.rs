//! Content pack file loader.
//!
//! Reads a pack from a JSON file and validates it before anything touches
//! storage.

use std::path::{Path, PathBuf};

use beacon_domain::{ContentPack, DomainError};
use thiserror::Error;
use tokio::fs;

/// Errors that can occur while loading a pack.
#[derive(Debug, Error)]
pub enum PackLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Content pack not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid content pack: {0}")]
    Invalid(#[from] DomainError),
}

pub async fn load_content_pack(path: impl AsRef<Path>) -> Result<ContentPack, PackLoadError> {
    let path = path.as_ref();
    if !fs::try_exists(path).await? {
        return Err(PackLoadError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).await?;
    let pack: ContentPack = serde_json::from_str(&content)?;
    pack.validate()?;

    tracing::debug!(
        pack = %pack.id,
        entries = pack.len(),
        path = %path.display(),
        "Loaded content pack"
    );
    Ok(pack)
}
