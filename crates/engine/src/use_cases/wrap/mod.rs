//! Live entity wrapping use cases.
//!
//! `wrap` resolves a document's scope and produces its live entity through
//! an operation context. `prepare` is the re-entrant variant: repeated calls
//! for the same document are numbered and only the newest result is
//! installed as the document's derived state.

mod jobs;

use std::sync::Arc;

use beacon_domain::{resolve_scope, Document, DocumentId};
use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::entities::{FactorySet, LiveEntity, OpCtx, Registry, WrapError};
use crate::infrastructure::ports::{DocumentStore, StoreEvent};

use jobs::JobTracker;

pub struct EntityWrapper {
    store: Arc<dyn DocumentStore>,
    factories: Arc<FactorySet>,
    trackers: DashMap<DocumentId, Arc<JobTracker>>,
    derived: DashMap<DocumentId, Arc<LiveEntity>>,
}

impl EntityWrapper {
    pub fn new(store: Arc<dyn DocumentStore>, factories: Arc<FactorySet>) -> Self {
        Self {
            store,
            factories,
            trackers: DashMap::new(),
            derived: DashMap::new(),
        }
    }

    /// Registry bound to the scope `doc` resolves to.
    pub fn registry_for(&self, doc: &Document) -> Result<Registry, WrapError> {
        let scope = resolve_scope(doc)?;
        Ok(Registry::new(scope, self.store.clone(), self.factories.clone()))
    }

    pub async fn wrap(&self, doc: &Document, ctx: &OpCtx) -> Result<Arc<LiveEntity>, WrapError> {
        let registry = self.registry_for(doc)?;
        registry.category(doc.entry_type).wrap_doc(ctx, doc).await
    }

    /// Wrap `doc` as a new prepare job and return the newest job's result.
    ///
    /// Without a context a fresh one is used.
    pub async fn prepare(
        &self,
        doc: &Document,
        ctx: Option<OpCtx>,
    ) -> Result<Arc<LiveEntity>, WrapError> {
        let tracker = self.trackers.entry(doc.id).or_default().clone();
        let ctx = ctx.unwrap_or_default();
        let result = tracker
            .run(self.wrap(doc, &ctx), |entity| {
                self.derived.insert(doc.id, entity.clone());
            })
            .await;

        if let Err(e) = &result {
            tracing::warn!(document_id = %doc.id, error = %e, "Prepare failed");
        }
        result
    }

    /// Derived state installed by the newest successful `prepare`.
    pub fn derived(&self, id: DocumentId) -> Option<Arc<LiveEntity>> {
        self.derived.get(&id).map(|e| e.value().clone())
    }

    /// Drop tracking and derived state for a deleted document.
    pub fn forget(&self, id: DocumentId) {
        self.trackers.remove(&id);
        self.derived.remove(&id);
    }

    /// Prepare jobs currently tracked for `id`.
    pub fn tracked_jobs(&self, id: DocumentId) -> usize {
        self.trackers.get(&id).map_or(0, |t| t.len())
    }

    /// Documents with installed derived state.
    pub fn derived_len(&self) -> usize {
        self.derived.len()
    }

    /// Forget each document the store deletes.
    ///
    /// The listener runs until the store's event channel closes.
    pub fn attach(self: &Arc<Self>, store: &dyn DocumentStore) -> JoinHandle<()> {
        let mut events = store.subscribe();
        let wrapper = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(StoreEvent::Deleted { id, .. }) => wrapper.forget(id),
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Entity wrapper fell behind the store");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Store event stream closed, entity wrapper detached");
        })
    }
}
