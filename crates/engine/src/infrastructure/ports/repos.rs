//! Document storage port.

use async_trait::async_trait;
use beacon_domain::{CollectionId, Document, DocumentId, NewDocument};
use tokio::sync::broadcast;

use super::error::RepoError;
use super::types::{CollectionConfig, CollectionInfo, CollectionSpec, DocumentFilter, StoreEvent};

/// The host storage engine.
///
/// Writes that touch a locked collection fail with [`RepoError::Locked`].
/// Every successful write is published on the [`DocumentStore::subscribe`]
/// stream after it is applied.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: DocumentId) -> Result<Option<Document>, RepoError>;
    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, RepoError>;

    /// Create documents in order. Stops at the first rejected document;
    /// documents created before it stay created.
    async fn create(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>, RepoError>;

    /// Shallow-merge `patch` into the payload. A non-object patch replaces it.
    async fn update(
        &self,
        id: DocumentId,
        patch: serde_json::Value,
    ) -> Result<Document, RepoError>;

    /// Delete documents, returning how many existed.
    async fn delete(&self, ids: Vec<DocumentId>) -> Result<usize, RepoError>;

    // Collections
    async fn ensure_collection(&self, spec: CollectionSpec) -> Result<CollectionInfo, RepoError>;
    async fn configure(
        &self,
        id: &CollectionId,
        config: CollectionConfig,
    ) -> Result<CollectionInfo, RepoError>;
    /// Drop the collection's cached index so the next listing rebuilds it.
    async fn clear_index(&self, id: &CollectionId) -> Result<(), RepoError>;
    async fn collections(&self) -> Result<Vec<CollectionInfo>, RepoError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
