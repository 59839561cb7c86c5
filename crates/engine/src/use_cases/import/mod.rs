//! Bulk content import.
//!
//! An import runs under the [`ImportLock`]: the pack is staged in memory,
//! entries whose lid already exists in a core collection are skipped, and
//! the rest are created in batches. Progress is counted from the store's
//! creation events rather than from our own bookkeeping.

mod clear;
mod error;
mod lock;
mod staging;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use beacon_domain::{core_collection_id, ContentPack, Lid, NewDocument};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::infrastructure::importers::load_content_pack;
use crate::infrastructure::ports::{DocumentFilter, DocumentStore, OperatorNotifier, StoreEvent};

pub use error::ImportError;
pub use lock::{ImportGuard, ImportLock, ImportPermit};
pub use staging::StagedPack;

/// A derived cache that must be dropped after an import changes content.
#[async_trait]
pub trait Invalidate: Send + Sync {
    async fn invalidate(&self);
}

#[async_trait]
impl Invalidate for crate::entities::CollectionIndex {
    async fn invalidate(&self) {
        crate::entities::CollectionIndex::invalidate(self).await;
    }
}

/// Outcome of one import pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub pack_id: String,
    /// Entries in the pack after duplicate lids were collapsed.
    pub total: usize,
    pub created: usize,
    /// Entries skipped because their lid was already imported.
    pub skipped_existing: usize,
    /// Entries dropped because an earlier entry of the same type had the same lid.
    pub duplicates: usize,
    /// Creation events observed while ingesting.
    pub transmitted: usize,
    /// Entries sent to the store in a batch it rejected and not created.
    pub failed: usize,
    /// Entries never sent to the store because ingestion stopped early.
    pub not_attempted: usize,
    pub failures: Vec<String>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub type ProgressFn<'a> = dyn FnMut(usize, usize) + Send + 'a;

pub struct ImportPipeline {
    store: Arc<dyn DocumentStore>,
    lock: Arc<ImportLock>,
    notifier: Arc<dyn OperatorNotifier>,
    caches: Vec<Arc<dyn Invalidate>>,
    batch_size: usize,
}

impl ImportPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        lock: Arc<ImportLock>,
        notifier: Arc<dyn OperatorNotifier>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            lock,
            notifier,
            caches: Vec::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// Register a cache to invalidate after each import or clear.
    pub fn invalidates(mut self, cache: Arc<dyn Invalidate>) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn lock(&self) -> &ImportLock {
        &self.lock
    }

    /// Import `pack` into the core collections.
    ///
    /// Only lock contention is returned as an error. Ingestion failures are
    /// logged, sent to the operator, and recorded in the report; the lock is
    /// released either way.
    pub async fn import(
        &self,
        pack: &ContentPack,
        on_progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<ImportReport, ImportError> {
        let report = self
            .lock
            .with_lock(|permit| async move { self.run(&permit, pack, on_progress).await })
            .await?;

        if report.is_success() {
            self.notifier.info(&format!(
                "Imported {} new entries from {}",
                report.created, pack.name
            ));
        }
        Ok(report)
    }

    /// Load the pack at `path` and import it.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        on_progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<ImportReport, ImportError> {
        let pack = load_content_pack(path).await?;
        self.import(&pack, on_progress).await
    }

    async fn run(
        &self,
        permit: &ImportPermit,
        pack: &ContentPack,
        mut on_progress: Option<&mut ProgressFn<'_>>,
    ) -> ImportReport {
        let staged = StagedPack::stage(pack);
        let total = staged.total();
        let mut report = ImportReport {
            pack_id: pack.id.clone(),
            total,
            duplicates: staged.duplicates(),
            ..ImportReport::default()
        };
        tracing::info!(pack = %pack.id, total, "Starting content import");

        let existing = match self.existing_lids(permit).await {
            Ok(lids) => lids,
            Err(e) => {
                report.not_attempted = total;
                self.fail(&mut report, format!("Failed to read existing content: {}", e));
                self.finish(permit).await;
                return report;
            }
        };

        let mut events = self.store.subscribe();
        let mut pending = Vec::with_capacity(self.batch_size);
        let mut attempted = 0;
        for (entry_type, entry) in staged.iter() {
            if existing.contains(&entry.lid) {
                report.skipped_existing += 1;
                continue;
            }
            pending.push(
                NewDocument::new(entry_type, entry.name.clone(), entry.payload())
                    .in_collection(core_collection_id(entry_type)),
            );
            if pending.len() == self.batch_size {
                let batch = std::mem::take(&mut pending);
                attempted += batch.len();
                if !self.ingest(permit, batch, &mut report, &mut events, &mut on_progress).await {
                    break;
                }
            }
        }
        if !pending.is_empty() && report.is_success() {
            attempted += pending.len();
            self.ingest(permit, pending, &mut report, &mut events, &mut on_progress)
                .await;
        }
        drop(events);
        if !report.is_success() {
            report.not_attempted = total - report.skipped_existing - attempted;
        }

        if let Some(progress) = on_progress.as_mut() {
            progress(report.transmitted, total);
        }

        self.finish(permit).await;
        tracing::info!(
            pack = %pack.id,
            created = report.created,
            skipped = report.skipped_existing,
            failed = report.failed,
            not_attempted = report.not_attempted,
            failures = report.failures.len(),
            "Content import finished"
        );
        report
    }

    /// Create one batch. Returns false if ingestion should stop.
    ///
    /// A rejected batch may still have created its leading documents; those
    /// are counted from the creation events the store published.
    async fn ingest(
        &self,
        permit: &ImportPermit,
        batch: Vec<NewDocument>,
        report: &mut ImportReport,
        events: &mut broadcast::Receiver<StoreEvent>,
        on_progress: &mut Option<&mut ProgressFn<'_>>,
    ) -> bool {
        let size = batch.len();
        let outcome = permit.create(batch).await;
        let observed = self.drain_progress(report, events, on_progress);

        match outcome {
            Ok(created) => {
                report.created += created.len();
                tracing::debug!(size, created = report.created, "Ingested batch");
                true
            }
            Err(e) => {
                let written = observed.min(size);
                report.created += written;
                report.failed += size - written;
                self.fail(report, format!("Import of {} failed: {}", report.pack_id, e));
                false
            }
        }
    }

    /// Count pending creation events into the core collections. Returns how
    /// many were seen.
    fn drain_progress(
        &self,
        report: &mut ImportReport,
        events: &mut broadcast::Receiver<StoreEvent>,
        on_progress: &mut Option<&mut ProgressFn<'_>>,
    ) -> usize {
        let mut seen = 0;
        loop {
            let observed = match events.try_recv() {
                Ok(StoreEvent::Created(doc))
                    if doc.parent.is_none() && doc.collection.as_ref().is_some_and(|c| c.is_core()) =>
                {
                    1
                }
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Import progress lagged behind creation events");
                    missed as usize
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            };
            seen += observed;
            report.transmitted = (report.transmitted + observed).min(report.total);
            if let Some(progress) = on_progress.as_mut() {
                progress(report.transmitted, report.total);
            }
        }
        seen
    }

    async fn existing_lids(&self, permit: &ImportPermit) -> Result<HashSet<Lid>, ImportError> {
        let mut lids = HashSet::new();
        for collection in permit.collections() {
            let docs = self
                .store
                .list(&DocumentFilter::all().in_collection(collection.clone()))
                .await?;
            lids.extend(docs.iter().filter_map(|d| d.lid()));
        }
        Ok(lids)
    }

    /// Drop every core collection index and the engine's derived caches.
    async fn finish(&self, permit: &ImportPermit) {
        for collection in permit.collections() {
            if let Err(e) = permit.clear_index(collection).await {
                tracing::warn!(collection = %collection, error = %e, "Failed to clear collection index");
            }
        }
        for cache in &self.caches {
            cache.invalidate().await;
        }
    }

    fn fail(&self, report: &mut ImportReport, message: String) {
        tracing::error!(pack = %report.pack_id, error = %message, "Content import failed");
        self.notifier.error(&message);
        report.failures.push(message);
    }
}
