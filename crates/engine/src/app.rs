//! Application state and composition.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::entities::{CollectionIndex, FactorySet};
use crate::infrastructure::{
    clock::SystemClock,
    config::EngineConfig,
    memory_store::InMemoryDocumentStore,
    notifier::TracingNotifier,
    ports::{ClockPort, DocumentStore, OperatorNotifier, RepoError},
};
use crate::notifications::ChangeDispatcher;
use crate::use_cases::{EntityWrapper, ImportLock, ImportPipeline, LicenseLookup};

/// Main application state.
///
/// Owns the store and every engine service built on it. The change
/// dispatcher and the entity wrapper listen to the store's event stream for
/// the lifetime of the app.
pub struct App {
    pub config: EngineConfig,
    pub store: Arc<dyn DocumentStore>,
    pub factories: Arc<FactorySet>,
    pub collections: Arc<CollectionIndex>,
    pub wrapper: Arc<EntityWrapper>,
    pub dispatcher: ChangeDispatcher,
    pub import: Arc<ImportPipeline>,
    pub licenses: Arc<LicenseLookup>,
    listeners: Vec<JoinHandle<()>>,
}

impl App {
    /// Wire every service around `store` and make sure the core
    /// collections exist.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn OperatorNotifier>,
        clock: Arc<dyn ClockPort>,
        config: EngineConfig,
    ) -> Result<Self, RepoError> {
        let factories = Arc::new(FactorySet::standard());
        let collections = Arc::new(CollectionIndex::new(store.clone(), clock.clone()));
        collections.ensure_all_core_collections().await?;

        let wrapper = Arc::new(EntityWrapper::new(store.clone(), factories.clone()));
        let licenses = Arc::new(LicenseLookup::new(
            store.clone(),
            factories.clone(),
            clock,
            config.license_cache_ttl(),
        ));

        let lock = Arc::new(ImportLock::new(store.clone(), collections.clone()));
        let import = Arc::new(
            ImportPipeline::new(store.clone(), lock, notifier, config.import_batch_size)
                .invalidates(collections.clone())
                .invalidates(licenses.clone()),
        );

        let dispatcher = ChangeDispatcher::new(config.debounce());
        let listeners = vec![
            dispatcher.attach(store.as_ref()),
            wrapper.attach(store.as_ref()),
        ];

        tracing::info!(
            debounce_ms = config.debounce_ms,
            batch_size = config.import_batch_size,
            "Engine ready"
        );

        Ok(Self {
            config,
            store,
            factories,
            collections,
            wrapper,
            dispatcher,
            import,
            licenses,
            listeners,
        })
    }

    /// App backed by an in-memory store, logging operator messages.
    pub async fn in_memory(config: EngineConfig) -> Result<Self, RepoError> {
        let store = Arc::new(InMemoryDocumentStore::new(config.event_buffer));
        Self::new(
            store,
            Arc::new(TracingNotifier),
            Arc::new(SystemClock::new()),
            config,
        )
        .await
    }
}

impl Drop for App {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}
