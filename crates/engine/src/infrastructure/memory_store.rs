//! In-memory document store.
//!
//! Reference implementation of [`DocumentStore`] used by the runner and the
//! tests. State lives behind one `RwLock`; events are published on a
//! broadcast channel after each write is applied.

use std::collections::HashMap;

use async_trait::async_trait;
use beacon_domain::{CollectionId, Document, DocumentId, NewDocument};
use tokio::sync::{broadcast, RwLock};

use crate::infrastructure::ports::{
    CollectionConfig, CollectionFilter, CollectionInfo, CollectionSpec, DocumentFilter,
    DocumentStore, RepoError, StoreEvent,
};

const DEFAULT_EVENT_BUFFER: usize = 1024;

pub struct InMemoryDocumentStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

#[derive(Default)]
struct StoreState {
    docs: HashMap<DocumentId, StoredDocument>,
    collections: HashMap<CollectionId, StoredCollection>,
    next_seq: u64,
}

struct StoredDocument {
    seq: u64,
    doc: Document,
}

struct StoredCollection {
    info: CollectionInfo,
    /// Lazily built list of member ids. `None` until the next listing.
    index: Option<Vec<DocumentId>>,
}

impl StoreState {
    fn check_writable(&self, collection: Option<&CollectionId>) -> Result<(), RepoError> {
        let Some(id) = collection else {
            return Ok(());
        };
        let stored = self
            .collections
            .get(id)
            .ok_or_else(|| RepoError::not_found("Collection", id))?;
        if stored.info.locked {
            return Err(RepoError::locked(id.clone()));
        }
        Ok(())
    }

    fn build_index(&self, id: &CollectionId) -> Vec<DocumentId> {
        let mut members: Vec<&StoredDocument> = self
            .docs
            .values()
            .filter(|s| s.doc.collection.as_ref() == Some(id))
            .collect();
        members.sort_by_key(|s| s.seq);
        members.into_iter().map(|s| s.doc.id).collect()
    }
}

impl InMemoryDocumentStore {
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    /// Total number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether the collection currently holds a cached index.
    pub async fn is_indexed(&self, id: &CollectionId) -> bool {
        self.state
            .read()
            .await
            .collections
            .get(id)
            .is_some_and(|c| c.index.is_some())
    }

    fn publish(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: DocumentId) -> Result<Option<Document>, RepoError> {
        Ok(self.state.read().await.docs.get(&id).map(|s| s.doc.clone()))
    }

    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, RepoError> {
        if let CollectionFilter::Named(id) = &filter.collection {
            let mut state = self.state.write().await;
            let index = match state.collections.get(id) {
                None => return Ok(Vec::new()),
                Some(StoredCollection {
                    index: Some(index), ..
                }) => index.clone(),
                Some(_) => {
                    let index = state.build_index(id);
                    tracing::debug!(collection = %id, size = index.len(), "Built collection index");
                    if let Some(stored) = state.collections.get_mut(id) {
                        stored.index = Some(index.clone());
                    }
                    index
                }
            };
            return Ok(index
                .iter()
                .filter_map(|doc_id| state.docs.get(doc_id))
                .map(|s| &s.doc)
                .filter(|doc| filter.matches(doc))
                .cloned()
                .collect());
        }

        let state = self.state.read().await;
        let mut matched: Vec<&StoredDocument> = state
            .docs
            .values()
            .filter(|s| filter.matches(&s.doc))
            .collect();
        matched.sort_by_key(|s| s.seq);
        Ok(matched.into_iter().map(|s| s.doc.clone()).collect())
    }

    async fn create(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>, RepoError> {
        let mut created = Vec::with_capacity(docs.len());
        for new_doc in docs {
            let mut state = self.state.write().await;
            state.check_writable(new_doc.collection.as_ref())?;
            if let Some(id) = &new_doc.collection {
                let kind = state.collections.get(id).map(|c| c.info.kind);
                if kind != Some(new_doc.entry_type.document_kind()) {
                    return Err(RepoError::constraint(format!(
                        "{} '{}' cannot be stored in collection {}",
                        new_doc.entry_type.friendly_name(),
                        new_doc.name,
                        id
                    )));
                }
            }

            let doc = new_doc.into_document(DocumentId::new());
            let seq = state.next_seq;
            state.next_seq += 1;
            if let Some(index) = doc
                .collection
                .as_ref()
                .and_then(|id| state.collections.get_mut(id))
                .and_then(|c| c.index.as_mut())
            {
                index.push(doc.id);
            }
            state.docs.insert(
                doc.id,
                StoredDocument {
                    seq,
                    doc: doc.clone(),
                },
            );
            drop(state);

            self.publish(StoreEvent::Created(doc.clone()));
            created.push(doc);
        }
        Ok(created)
    }

    async fn update(
        &self,
        id: DocumentId,
        patch: serde_json::Value,
    ) -> Result<Document, RepoError> {
        let mut state = self.state.write().await;
        let collection = state
            .docs
            .get(&id)
            .ok_or_else(|| RepoError::not_found("Document", id))?
            .doc
            .collection
            .clone();
        state.check_writable(collection.as_ref())?;

        let stored = state
            .docs
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("Document", id))?;
        match (&mut stored.doc.payload, patch) {
            (serde_json::Value::Object(current), serde_json::Value::Object(patch)) => {
                for (key, value) in patch {
                    current.insert(key, value);
                }
            }
            (payload, patch) => *payload = patch,
        }
        let doc = stored.doc.clone();
        drop(state);

        self.publish(StoreEvent::Updated(doc.clone()));
        Ok(doc)
    }

    async fn delete(&self, ids: Vec<DocumentId>) -> Result<usize, RepoError> {
        let mut state = self.state.write().await;
        for id in &ids {
            if let Some(stored) = state.docs.get(id) {
                state.check_writable(stored.doc.collection.as_ref())?;
            }
        }

        let mut removed = Vec::new();
        for id in ids {
            if let Some(stored) = state.docs.remove(&id) {
                if let Some(index) = stored
                    .doc
                    .collection
                    .as_ref()
                    .and_then(|c| state.collections.get_mut(c))
                    .and_then(|c| c.index.as_mut())
                {
                    index.retain(|member| *member != id);
                }
                removed.push(stored.doc);
            }
        }
        drop(state);

        let count = removed.len();
        for doc in removed {
            self.publish(StoreEvent::Deleted {
                id: doc.id,
                collection: doc.collection,
            });
        }
        Ok(count)
    }

    async fn ensure_collection(&self, spec: CollectionSpec) -> Result<CollectionInfo, RepoError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.collections.get(&spec.id) {
            if existing.info.kind != spec.kind {
                return Err(RepoError::constraint(format!(
                    "Collection {} holds {} documents, not {}",
                    spec.id, existing.info.kind, spec.kind
                )));
            }
            return Ok(existing.info.clone());
        }

        tracing::info!(collection = %spec.id, kind = %spec.kind, "Creating collection");
        let info = CollectionInfo {
            id: spec.id.clone(),
            kind: spec.kind,
            label: spec.label,
            locked: spec.locked,
            private: false,
        };
        state.collections.insert(
            spec.id,
            StoredCollection {
                info: info.clone(),
                index: None,
            },
        );
        Ok(info)
    }

    async fn configure(
        &self,
        id: &CollectionId,
        config: CollectionConfig,
    ) -> Result<CollectionInfo, RepoError> {
        let mut state = self.state.write().await;
        let stored = state
            .collections
            .get_mut(id)
            .ok_or_else(|| RepoError::not_found("Collection", id))?;
        if let Some(locked) = config.locked {
            stored.info.locked = locked;
        }
        if let Some(private) = config.private {
            stored.info.private = private;
        }
        Ok(stored.info.clone())
    }

    async fn clear_index(&self, id: &CollectionId) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let stored = state
            .collections
            .get_mut(id)
            .ok_or_else(|| RepoError::not_found("Collection", id))?;
        stored.index = None;
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<CollectionInfo>, RepoError> {
        let state = self.state.read().await;
        let mut infos: Vec<CollectionInfo> =
            state.collections.values().map(|c| c.info.clone()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(infos)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_domain::{core_collection_id, DocumentKind, EntryType};
    use serde_json::json;

    fn skill(name: &str) -> NewDocument {
        NewDocument::new(EntryType::Skill, name, json!({ "lid": name.to_lowercase() }))
    }

    async fn store_with_skill_collection(locked: bool) -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::default();
        store
            .ensure_collection(CollectionSpec {
                id: core_collection_id(EntryType::Skill),
                kind: DocumentKind::Item,
                label: "Skill Triggers".to_string(),
                locked,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_then_get_and_list() {
        let store = InMemoryDocumentStore::default();
        let created = store.create(vec![skill("Pull"), skill("Spot")]).await.unwrap();

        let fetched = store.get(created[0].id).await.unwrap().unwrap();
        assert_eq!(fetched, created[0]);

        let listed = store.list(&DocumentFilter::of_type(EntryType::Skill)).await.unwrap();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn writes_into_locked_collection_fail() {
        let store = store_with_skill_collection(true).await;
        let err = store
            .create(vec![skill("Pull").in_collection(core_collection_id(EntryType::Skill))])
            .await
            .unwrap_err();
        assert!(err.is_locked());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn item_cannot_land_in_actor_collection() {
        let store = InMemoryDocumentStore::default();
        store
            .ensure_collection(CollectionSpec {
                id: core_collection_id(EntryType::Pilot),
                kind: DocumentKind::Actor,
                label: "Pilots".to_string(),
                locked: false,
            })
            .await
            .unwrap();

        let err = store
            .create(vec![skill("Pull").in_collection(core_collection_id(EntryType::Pilot))])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn update_merges_top_level_keys() {
        let store = InMemoryDocumentStore::default();
        let doc = store.create(vec![skill("Pull")]).await.unwrap().remove(0);

        let updated = store.update(doc.id, json!({ "rank": 2 })).await.unwrap();
        assert_eq!(updated.payload, json!({ "lid": "pull", "rank": 2 }));
    }

    #[tokio::test]
    async fn events_follow_writes() {
        let store = InMemoryDocumentStore::default();
        let mut events = store.subscribe();

        let doc = store.create(vec![skill("Pull")]).await.unwrap().remove(0);
        store.update(doc.id, json!({ "rank": 1 })).await.unwrap();
        assert_eq!(store.delete(vec![doc.id, DocumentId::new()]).await.unwrap(), 1);

        assert!(matches!(events.recv().await.unwrap(), StoreEvent::Created(d) if d.id == doc.id));
        assert!(matches!(events.recv().await.unwrap(), StoreEvent::Updated(d) if d.id == doc.id));
        assert_eq!(events.recv().await.unwrap().document_id(), doc.id);
    }

    #[tokio::test]
    async fn collection_index_is_cached_until_cleared() {
        let store = store_with_skill_collection(false).await;
        let collection = core_collection_id(EntryType::Skill);
        store
            .create(vec![skill("Pull").in_collection(collection.clone())])
            .await
            .unwrap();

        assert!(!store.is_indexed(&collection).await);
        let listed = store
            .list(&DocumentFilter::all().in_collection(collection.clone()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(store.is_indexed(&collection).await);

        store.clear_index(&collection).await.unwrap();
        assert!(!store.is_indexed(&collection).await);
    }

    #[tokio::test]
    async fn configure_toggles_lock() {
        let store = store_with_skill_collection(true).await;
        let collection = core_collection_id(EntryType::Skill);

        let info = store
            .configure(&collection, CollectionConfig::locked(false))
            .await
            .unwrap();
        assert!(!info.locked);
        store
            .create(vec![skill("Pull").in_collection(collection)])
            .await
            .unwrap();
    }
}
