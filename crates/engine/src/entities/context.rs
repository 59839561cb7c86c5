//! Operation context: a per-pass identity map of live entities.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use beacon_domain::{DocumentId, ScopeDescriptor};
use tokio::sync::{Mutex, OnceCell};

use super::error::WrapError;
use super::live::LiveEntity;

type Slot = Arc<OnceCell<Arc<LiveEntity>>>;

/// Identity map for one logical resolution pass.
///
/// Resolving the same (scope, id) twice through one context yields the same
/// `Arc`, even when the second request arrives while the first is still
/// being built. Cloning the context shares the map. Dropping every clone
/// discards it.
#[derive(Clone, Default)]
pub struct OpCtx {
    slots: Arc<Mutex<HashMap<(ScopeDescriptor, DocumentId), Slot>>>,
}

impl OpCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized entity for the pair, or run `factory` to build it.
    ///
    /// A failed factory leaves the slot empty so a later request may retry.
    pub async fn get_or_create<F, Fut>(
        &self,
        scope: &ScopeDescriptor,
        id: DocumentId,
        factory: F,
    ) -> Result<Arc<LiveEntity>, WrapError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<LiveEntity>, WrapError>>,
    {
        let key = (scope.clone(), id);
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.clone()).or_default().clone()
        };

        let result = slot.get_or_try_init(factory).await.cloned();

        if result.is_err() {
            let mut slots = self.slots.lock().await;
            let stale = slots
                .get(&key)
                .is_some_and(|s| Arc::ptr_eq(s, &slot) && !s.initialized());
            if stale {
                slots.remove(&key);
            }
        } else {
            tracing::trace!(document_id = %id, scope = %scope, "Resolved through context");
        }

        result
    }

    /// Already-resolved entity for the pair, without building anything.
    pub async fn get(&self, scope: &ScopeDescriptor, id: DocumentId) -> Option<Arc<LiveEntity>> {
        let slots = self.slots.lock().await;
        slots
            .get(&(scope.clone(), id))
            .and_then(|slot| slot.get().cloned())
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for OpCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpCtx").finish_non_exhaustive()
    }
}
