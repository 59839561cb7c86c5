//! Debounced per-document change signals.
//!
//! Every mutation schedules a signal after a quiet period. A newer mutation
//! of the same document aborts the pending task and schedules a fresh one,
//! so a burst produces a single signal carrying the last state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_domain::{Document, DocumentId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::infrastructure::ports::{DocumentStore, StoreEvent};

pub type ChangeHandler = Arc<dyn Fn(&Document) + Send + Sync>;

/// Handle returned by [`ChangeDispatcher::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    document_id: DocumentId,
    key: Uuid,
}

impl Subscription {
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }
}

#[derive(Clone)]
pub struct ChangeDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    quiet_period: Duration,
    next_generation: AtomicU64,
    /// Scheduled signal per document, tagged with the generation that owns it.
    pending: DashMap<DocumentId, (u64, JoinHandle<()>)>,
    subscribers: DashMap<DocumentId, HashMap<Uuid, ChangeHandler>>,
}

impl ChangeDispatcher {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                quiet_period,
                next_generation: AtomicU64::new(0),
                pending: DashMap::new(),
                subscribers: DashMap::new(),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet_period
    }

    /// Record a mutation. Must be called from within a Tokio runtime.
    pub fn notify(&self, doc: Document) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(document_id = %doc.id, "No runtime available, dropping change notification");
            return;
        };

        let id = doc.id;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let task = async move {
            tokio::time::sleep(inner.quiet_period).await;
            inner.fire(generation, doc);
        };

        match self.inner.pending.entry(id) {
            Entry::Occupied(mut slot) => {
                let (_, previous) = slot.insert((generation, runtime.spawn(task)));
                previous.abort();
                tracing::trace!(document_id = %id, "Rescheduled change signal");
            }
            Entry::Vacant(slot) => {
                slot.insert((generation, runtime.spawn(task)));
            }
        }
    }

    /// Drop a scheduled signal without firing it.
    pub fn cancel(&self, id: DocumentId) -> bool {
        match self.inner.pending.remove(&id) {
            Some((_, (_, handle))) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn subscribe(
        &self,
        document_id: DocumentId,
        handler: impl Fn(&Document) + Send + Sync + 'static,
    ) -> Subscription {
        let key = Uuid::new_v4();
        self.inner
            .subscribers
            .entry(document_id)
            .or_default()
            .insert(key, Arc::new(handler));
        Subscription { document_id, key }
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let removed = self
            .inner
            .subscribers
            .get_mut(&subscription.document_id)
            .is_some_and(|mut handlers| handlers.remove(&subscription.key).is_some());
        self.inner
            .subscribers
            .remove_if(&subscription.document_id, |_, handlers| handlers.is_empty());
        removed
    }

    /// Number of documents with a signal still waiting out its quiet period.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    /// Forward the store's create and update events into [`ChangeDispatcher::notify`].
    ///
    /// The listener runs until the store's event channel closes.
    pub fn attach(&self, store: &dyn DocumentStore) -> JoinHandle<()> {
        let mut events = store.subscribe();
        let dispatcher = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(StoreEvent::Created(doc)) | Ok(StoreEvent::Updated(doc)) => {
                        dispatcher.notify(doc)
                    }
                    Ok(StoreEvent::Deleted { id, .. }) => {
                        dispatcher.cancel(id);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Change dispatcher fell behind the store");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Store event stream closed, change dispatcher detached");
        })
    }
}

impl DispatcherInner {
    fn fire(&self, generation: u64, doc: Document) {
        let current = self
            .pending
            .remove_if(&doc.id, |_, (owner, _)| *owner == generation)
            .is_some();
        if !current {
            return;
        }

        let handlers: Vec<ChangeHandler> = self
            .subscribers
            .get(&doc.id)
            .map(|handlers| handlers.values().cloned().collect())
            .unwrap_or_default();
        tracing::debug!(document_id = %doc.id, handlers = handlers.len(), "Dispatching change signal");
        for handler in handlers {
            handler(&doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::InMemoryDocumentStore;
    use beacon_domain::{EntryType, NewDocument};
    use serde_json::json;
    use std::sync::Mutex;

    fn mech(id: DocumentId, hp: i64) -> Document {
        NewDocument::new(EntryType::Mech, "Everest", json!({ "lid": "", "hp": hp }))
            .into_document(id)
    }

    fn recorder(
        dispatcher: &ChangeDispatcher,
        id: DocumentId,
    ) -> (Subscription, Arc<Mutex<Vec<i64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = dispatcher.subscribe(id, move |doc| {
            let hp = doc.payload["hp"].as_i64().unwrap_or(-1);
            sink.lock().unwrap().push(hp);
        });
        (sub, seen)
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn burst_collapses_into_one_signal_with_final_state() {
        let dispatcher = ChangeDispatcher::new(Duration::from_millis(500));
        let id = DocumentId::new();
        let (_sub, seen) = recorder(&dispatcher, id);

        for hp in 1..=5 {
            dispatcher.notify(mech(id, hp));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*seen.lock().unwrap(), vec![5]);
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn spaced_mutations_each_signal() {
        let dispatcher = ChangeDispatcher::new(Duration::from_millis(500));
        let id = DocumentId::new();
        let (_sub, seen) = recorder(&dispatcher, id);

        for hp in 1..=3 {
            dispatcher.notify(mech(id, hp));
            tokio::time::sleep(Duration::from_millis(700)).await;
        }

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn documents_debounce_independently() {
        let dispatcher = ChangeDispatcher::new(Duration::from_millis(500));
        let (a, b) = (DocumentId::new(), DocumentId::new());
        let (_sa, seen_a) = recorder(&dispatcher, a);
        let (_sb, seen_b) = recorder(&dispatcher, b);

        dispatcher.notify(mech(a, 1));
        dispatcher.notify(mech(b, 2));
        assert_eq!(dispatcher.pending_len(), 2);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*seen_a.lock().unwrap(), vec![1]);
        assert_eq!(*seen_b.lock().unwrap(), vec![2]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn unsubscribe_is_idempotent_and_silences_pending_fire() {
        let dispatcher = ChangeDispatcher::new(Duration::from_millis(500));
        let id = DocumentId::new();
        let (sub, seen) = recorder(&dispatcher, id);

        dispatcher.notify(mech(id, 1));
        assert!(dispatcher.unsubscribe(&sub));
        assert!(!dispatcher.unsubscribe(&sub));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn attach_forwards_store_writes() {
        let store = InMemoryDocumentStore::default();
        let dispatcher = ChangeDispatcher::new(Duration::from_millis(500));
        let listener = dispatcher.attach(&store);

        let doc = store
            .create(vec![NewDocument::new(EntryType::Mech, "Everest", json!({ "lid": "", "hp": 8 }))])
            .await
            .unwrap()
            .remove(0);
        let (_sub, seen) = recorder(&dispatcher, doc.id);
        store.update(doc.id, json!({ "hp": 4 })).await.unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*seen.lock().unwrap(), vec![4]);
        listener.abort();
    }
}
