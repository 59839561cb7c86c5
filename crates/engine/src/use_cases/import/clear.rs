//! Emptying the core collections.

use super::error::ImportError;
use super::{ImportPermit, ImportPipeline};
use crate::infrastructure::ports::{DocumentFilter, RepoError};

impl ImportPipeline {
    /// Delete every document in every core collection, under the import lock.
    ///
    /// Returns the number of documents deleted.
    pub async fn clear_all(&self) -> Result<usize, ImportError> {
        let outcome = self
            .lock()
            .with_lock(|permit| async move { self.clear_collections(&permit).await })
            .await?;

        match outcome {
            Ok(deleted) => {
                tracing::info!(deleted, "Cleared core collections");
                self.notifier
                    .info(&format!("Cleared {} entries from the core compendiums", deleted));
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to clear core collections");
                self.notifier
                    .error(&format!("Failed to clear the core compendiums: {}", e));
                Err(e.into())
            }
        }
    }

    async fn clear_collections(&self, permit: &ImportPermit) -> Result<usize, RepoError> {
        let mut deleted = 0;
        for collection in permit.collections() {
            let ids: Vec<_> = self
                .store
                .list(&DocumentFilter::all().in_collection(collection.clone()))
                .await?
                .into_iter()
                .map(|doc| doc.id)
                .collect();
            if !ids.is_empty() {
                deleted += permit.delete(ids).await?;
            }
        }
        self.finish(permit).await;
        Ok(deleted)
    }
}
