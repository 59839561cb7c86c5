//! Compendium collection bookkeeping.

use std::sync::Arc;

use beacon_domain::{core_collection_id, DocumentKind, EntryType};

use crate::infrastructure::cache::FetchCache;
use crate::infrastructure::ports::{
    ClockPort, CollectionInfo, CollectionSpec, DocumentStore, RepoError,
};

/// Core collection creation and a cached listing of secondary compendiums.
pub struct CollectionIndex {
    store: Arc<dyn DocumentStore>,
    secondary: FetchCache<DocumentKind, Vec<CollectionInfo>>,
}

impl CollectionIndex {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            store,
            secondary: FetchCache::new(None, clock),
        }
    }

    /// Create the core collection for `entry_type` if it is missing.
    ///
    /// New core collections start locked.
    pub async fn ensure_core_collection(
        &self,
        entry_type: EntryType,
    ) -> Result<CollectionInfo, RepoError> {
        self.store
            .ensure_collection(CollectionSpec {
                id: core_collection_id(entry_type),
                kind: entry_type.document_kind(),
                label: entry_type.friendly_name_plural().to_string(),
                locked: true,
            })
            .await
    }

    pub async fn ensure_all_core_collections(&self) -> Result<Vec<CollectionInfo>, RepoError> {
        let mut infos = Vec::with_capacity(EntryType::ALL.len());
        for entry_type in EntryType::all() {
            infos.push(self.ensure_core_collection(entry_type).await?);
        }
        Ok(infos)
    }

    /// Non-core compendium collections holding `kind` documents.
    ///
    /// Cached until [`CollectionIndex::invalidate`].
    pub async fn secondary_collections(
        &self,
        kind: DocumentKind,
    ) -> Result<Vec<CollectionInfo>, RepoError> {
        let store = self.store.clone();
        self.secondary
            .fetch(kind, |kind| async move {
                let all = store.collections().await?;
                Ok::<_, RepoError>(all
                    .into_iter()
                    .filter(|c| c.kind == kind && !c.id.is_core())
                    .collect())
            })
            .await
    }

    pub async fn invalidate(&self) {
        self.secondary.flush_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::ports::MockDocumentStore;
    use beacon_domain::CollectionId;

    fn info(id: &str, kind: DocumentKind) -> CollectionInfo {
        CollectionInfo {
            id: CollectionId::new(id),
            kind,
            label: id.to_string(),
            locked: false,
            private: false,
        }
    }

    #[tokio::test]
    async fn ensure_core_collection_uses_friendly_label() {
        let mut store = MockDocumentStore::new();
        store
            .expect_ensure_collection()
            .withf(|spec| {
                spec.id.as_str() == "world.npc_class"
                    && spec.label == "Npc Classes"
                    && spec.kind == DocumentKind::Item
                    && spec.locked
            })
            .times(1)
            .returning(|spec| {
                Ok(CollectionInfo {
                    id: spec.id,
                    kind: spec.kind,
                    label: spec.label,
                    locked: spec.locked,
                    private: false,
                })
            });

        let index = CollectionIndex::new(Arc::new(store), Arc::new(SystemClock));
        let info = index.ensure_core_collection(EntryType::NpcClass).await.unwrap();
        assert!(info.locked);
    }

    #[tokio::test]
    async fn secondary_collections_are_cached_until_invalidated() {
        let mut store = MockDocumentStore::new();
        store.expect_collections().times(2).returning(|| {
            Ok(vec![
                info("world.frame", DocumentKind::Item),
                info("world.homebrew-frames", DocumentKind::Item),
                info("world.premade-pilots", DocumentKind::Actor),
            ])
        });
        let index = CollectionIndex::new(Arc::new(store), Arc::new(SystemClock));

        let items = index.secondary_collections(DocumentKind::Item).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "world.homebrew-frames");

        index.secondary_collections(DocumentKind::Item).await.unwrap();
        index.invalidate().await;
        index.secondary_collections(DocumentKind::Item).await.unwrap();
    }
}
