//! The import lock.
//!
//! Core collections stay locked except while an import or clear runs. The
//! lock flips every core collection together, so they always share one
//! lock state.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_domain::{CollectionId, Document, DocumentId, NewDocument};

use super::error::ImportError;
use crate::entities::CollectionIndex;
use crate::infrastructure::ports::{CollectionConfig, DocumentStore, RepoError};

pub struct ImportLock {
    importing: Arc<AtomicBool>,
    store: Arc<dyn DocumentStore>,
    collections: Arc<CollectionIndex>,
}

impl ImportLock {
    pub fn new(store: Arc<dyn DocumentStore>, collections: Arc<CollectionIndex>) -> Self {
        Self {
            importing: Arc::new(AtomicBool::new(false)),
            store,
            collections,
        }
    }

    pub fn is_importing(&self) -> bool {
        self.importing.load(Ordering::SeqCst)
    }

    /// Mark the world as importing and unlock every core collection.
    ///
    /// Fails fast with [`ImportError::AlreadyImporting`] if held elsewhere.
    pub async fn acquire(&self) -> Result<ImportGuard, ImportError> {
        if self
            .importing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ImportError::AlreadyImporting);
        }

        let mut guard = ImportGuard {
            importing: self.importing.clone(),
            store: self.store.clone(),
            collections: Arc::from(Vec::new()),
            released: false,
        };

        let infos = match self.collections.ensure_all_core_collections().await {
            Ok(infos) => infos,
            Err(e) => {
                guard.release().await;
                return Err(e.into());
            }
        };
        guard.collections = infos.into_iter().map(|c| c.id).collect();

        let collections = guard.collections.clone();
        for id in collections.iter() {
            if let Err(e) = self.store.configure(id, CollectionConfig::locked(false)).await {
                guard.release().await;
                return Err(e.into());
            }
        }

        tracing::debug!(collections = guard.collections.len(), "Import lock acquired");
        Ok(guard)
    }

    /// Run `f` while holding the lock. The lock is released afterwards no
    /// matter what `f` returns.
    pub async fn with_lock<T, F, Fut>(&self, f: F) -> Result<T, ImportError>
    where
        F: FnOnce(ImportPermit) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire().await?;
        let out = f(guard.permit()).await;
        guard.release().await;
        Ok(out)
    }
}

/// Ownership of the import lock.
///
/// Release it with [`ImportGuard::release`]. Dropping it unreleased clears
/// the importing flag immediately and re-locks the collections on a
/// background task.
pub struct ImportGuard {
    importing: Arc<AtomicBool>,
    store: Arc<dyn DocumentStore>,
    collections: Arc<[CollectionId]>,
    released: bool,
}

impl ImportGuard {
    /// The core collections unlocked by this guard.
    pub fn collections(&self) -> &[CollectionId] {
        &self.collections
    }

    pub fn permit(&self) -> ImportPermit {
        ImportPermit {
            collections: self.collections.clone(),
            store: self.store.clone(),
        }
    }

    pub async fn release(mut self) {
        relock(self.store.as_ref(), &self.collections).await;
        self.importing.store(false, Ordering::SeqCst);
        self.released = true;
        tracing::debug!("Import lock released");
    }
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.importing.store(false, Ordering::SeqCst);
        tracing::warn!("Import guard dropped without release");

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let store = self.store.clone();
                let collections = self.collections.clone();
                runtime.spawn(async move { relock(store.as_ref(), &collections).await });
            }
            Err(_) => tracing::error!("No runtime available to re-lock core collections"),
        }
    }
}

/// Proof that the import lock is held, handed to work done under it.
///
/// Only an [`ImportGuard`] can mint one, and writes into the core
/// collections go through it.
pub struct ImportPermit {
    collections: Arc<[CollectionId]>,
    store: Arc<dyn DocumentStore>,
}

impl ImportPermit {
    pub fn collections(&self) -> &[CollectionId] {
        &self.collections
    }

    pub(crate) async fn create(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>, RepoError> {
        self.store.create(docs).await
    }

    pub(crate) async fn delete(&self, ids: Vec<DocumentId>) -> Result<usize, RepoError> {
        self.store.delete(ids).await
    }

    pub(crate) async fn clear_index(&self, id: &CollectionId) -> Result<(), RepoError> {
        self.store.clear_index(id).await
    }
}

impl std::fmt::Debug for ImportPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportPermit")
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

async fn relock(store: &dyn DocumentStore, collections: &[CollectionId]) {
    for id in collections {
        if let Err(e) = store.configure(id, CollectionConfig::locked(true)).await {
            tracing::error!(collection = %id, error = %e, "Failed to re-lock collection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::memory_store::InMemoryDocumentStore;
    use beacon_domain::EntryType;

    fn lock_over(store: Arc<InMemoryDocumentStore>) -> ImportLock {
        let collections = Arc::new(CollectionIndex::new(store.clone(), Arc::new(SystemClock)));
        ImportLock::new(store, collections)
    }

    async fn all_locked(store: &InMemoryDocumentStore, locked: bool) -> bool {
        let infos = store.collections().await.unwrap();
        infos.len() == EntryType::ALL.len() && infos.iter().all(|c| c.locked == locked)
    }

    #[tokio::test]
    async fn acquire_unlocks_and_release_relocks() {
        let store = Arc::new(InMemoryDocumentStore::default());
        let lock = lock_over(store.clone());

        let guard = lock.acquire().await.unwrap();
        assert!(lock.is_importing());
        assert_eq!(guard.collections().len(), EntryType::ALL.len());
        assert!(all_locked(&store, false).await);

        guard.release().await;
        assert!(!lock.is_importing());
        assert!(all_locked(&store, true).await);
    }

    #[tokio::test]
    async fn second_acquire_fails_fast() {
        let lock = lock_over(Arc::new(InMemoryDocumentStore::default()));
        let guard = lock.acquire().await.unwrap();

        assert!(matches!(
            lock.acquire().await,
            Err(ImportError::AlreadyImporting)
        ));
        guard.release().await;
        assert!(lock.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn with_lock_releases_after_work() {
        let store = Arc::new(InMemoryDocumentStore::default());
        let lock = lock_over(store.clone());

        let seen = lock
            .with_lock(|permit| async move { permit.collections().len() })
            .await
            .unwrap();

        assert_eq!(seen, EntryType::ALL.len());
        assert!(!lock.is_importing());
        assert!(all_locked(&store, true).await);
    }

    #[tokio::test]
    async fn permit_writes_only_while_held() {
        use beacon_domain::{core_collection_id, NewDocument};
        use serde_json::json;

        let store = Arc::new(InMemoryDocumentStore::default());
        let lock = lock_over(store.clone());
        let heat = || {
            NewDocument::new(EntryType::Tag, "Heat", json!({ "lid": "tg_heat" }))
                .in_collection(core_collection_id(EntryType::Tag))
        };

        let created = lock
            .with_lock(|permit| async move { permit.create(vec![heat()]).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.len(), 1);

        let err = store.create(vec![heat()]).await.unwrap_err();
        assert!(err.is_locked());
    }

    #[tokio::test]
    async fn dropped_guard_clears_flag() {
        let store = Arc::new(InMemoryDocumentStore::default());
        let lock = lock_over(store.clone());

        drop(lock.acquire().await.unwrap());
        assert!(!lock.is_importing());

        // Let the background re-lock run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(all_locked(&store, true).await);
    }
}
