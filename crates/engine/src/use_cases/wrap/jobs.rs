//! Per-document prepare job tracking.
//!
//! Jobs are numbered in start order. Only the newest job installs its
//! result; an older job that finishes late hands its caller the newest
//! job's result instead of its own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::entities::{LiveEntity, WrapError};

pub(crate) type JobResult = Result<Arc<LiveEntity>, WrapError>;

#[derive(Default)]
pub(crate) struct JobTracker {
    latest: AtomicU64,
    /// Result channels of jobs that may still be forwarded to.
    jobs: Mutex<HashMap<u64, watch::Receiver<Option<JobResult>>>>,
}

impl JobTracker {
    pub(crate) async fn run<F>(&self, work: F, install: impl FnOnce(&Arc<LiveEntity>)) -> JobResult
    where
        F: Future<Output = JobResult>,
    {
        let (job, tx) = self.begin();
        let result = work.await;
        self.finish(job, tx, result, install).await
    }

    /// Number of jobs still tracked.
    pub(crate) fn len(&self) -> usize {
        self.lock_jobs().len()
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, HashMap<u64, watch::Receiver<Option<JobResult>>>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self) -> (u64, watch::Sender<Option<JobResult>>) {
        let (tx, rx) = watch::channel(None);
        let mut jobs = self.lock_jobs();
        let job = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        jobs.insert(job, rx);
        (job, tx)
    }

    async fn finish(
        &self,
        job: u64,
        tx: watch::Sender<Option<JobResult>>,
        result: JobResult,
        install: impl FnOnce(&Arc<LiveEntity>),
    ) -> JobResult {
        let newest = {
            let mut jobs = self.lock_jobs();
            let latest = self.latest.load(Ordering::SeqCst);
            if latest == job {
                if let Ok(entity) = &result {
                    install(entity);
                }
                jobs.retain(|id, _| *id == job);
                tx.send_replace(Some(result.clone()));
                return result;
            }
            jobs.remove(&job);
            jobs.get(&latest).cloned()
        };

        tracing::trace!(job, "Prepare job superseded, forwarding to newest result");
        let forwarded = match newest {
            Some(mut rx) => rx
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|r| (*r).clone()),
            None => None,
        };
        let outcome = forwarded.unwrap_or(result);
        tx.send_replace(Some(outcome.clone()));
        outcome
    }
}
