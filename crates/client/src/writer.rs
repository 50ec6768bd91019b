//! Background cache write-back.
//!
//! Searches hand their normalized records to the [`CacheWriter`] and return
//! without waiting. Jobs go through a bounded queue; a dispatcher task runs
//! them with bounded concurrency. When the queue is full the job is dropped,
//! and a failed job is logged and never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use sift_core::AppConfig;
use sift_core::QueryCache;
use sift_core::cache::DEFAULT_CACHE_TIMEOUT;
use sift_core::model::{Category, ExtractedRecord};

/// Queue and concurrency limits for the writer.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub queue_capacity: usize,
    pub concurrency: usize,
    /// Upper bound for one store call.
    pub job_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { queue_capacity: 64, concurrency: 4, job_timeout: DEFAULT_CACHE_TIMEOUT }
    }
}

impl From<&AppConfig> for WriterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            queue_capacity: config.writer_queue_capacity,
            concurrency: config.writer_concurrency,
            job_timeout: config.cache_timeout(),
        }
    }
}

/// Snapshot of writer activity since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Jobs accepted into the queue.
    pub submitted: u64,
    /// Jobs whose store call returned.
    pub completed: u64,
    /// Jobs that timed out or panicked.
    pub failed: u64,
    /// Jobs rejected because the queue was full or closed.
    pub dropped: u64,
    /// Documents written across all completed jobs.
    pub written: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WriterStats {
        WriterStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct WriteJob {
    records: Vec<ExtractedRecord>,
    category: Category,
}

/// Bounded, fire-and-forget writer in front of a [`QueryCache`].
#[derive(Debug)]
pub struct CacheWriter {
    sender: Mutex<Option<mpsc::Sender<WriteJob>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl CacheWriter {
    /// Start the dispatcher. Must be called from within a Tokio runtime.
    pub fn spawn(cache: QueryCache, config: WriterConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let dispatcher = tokio::spawn(dispatch(cache, receiver, config, Arc::clone(&counters)));

        Self { sender: Mutex::new(Some(sender)), dispatcher: Mutex::new(Some(dispatcher)), counters }
    }

    /// Queue `records` for storage. Never blocks; returns whether the job was
    /// accepted.
    pub fn submit(&self, records: Vec<ExtractedRecord>, category: Category) -> bool {
        if records.is_empty() {
            return false;
        }

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            Counters::bump(&self.counters.dropped, 1);
            tracing::warn!(%category, "cache writer is shut down, dropping write");
            return false;
        };

        let count = records.len();
        match sender.try_send(WriteJob { records, category }) {
            Ok(()) => {
                Counters::bump(&self.counters.submitted, 1);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                Counters::bump(&self.counters.dropped, 1);
                tracing::warn!(%category, records = count, "cache write queue full, dropping write");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Counters::bump(&self.counters.dropped, 1);
                tracing::warn!(%category, records = count, "cache write queue closed, dropping write");
                false
            }
        }
    }

    pub fn stats(&self) -> WriterStats {
        self.counters.snapshot()
    }

    /// Stop accepting jobs and wait for queued and in-flight ones to finish.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner).take());

        let dispatcher = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = dispatcher
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "cache writer dispatcher failed");
        }

        let stats = self.stats();
        tracing::info!(
            submitted = stats.submitted,
            completed = stats.completed,
            failed = stats.failed,
            dropped = stats.dropped,
            "cache writer drained"
        );
    }
}

async fn dispatch(
    cache: QueryCache, mut receiver: mpsc::Receiver<WriteJob>, config: WriterConfig, counters: Arc<Counters>,
) {
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    while let Some(job) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        while let Some(result) = tasks.try_join_next() {
            reap(&counters, result);
        }

        let cache = cache.clone();
        let counters = Arc::clone(&counters);
        tasks.spawn(async move {
            let _permit = permit;
            run_job(&cache, job, config.job_timeout, &counters).await;
        });
    }

    while let Some(result) = tasks.join_next().await {
        reap(&counters, result);
    }
}

async fn run_job(cache: &QueryCache, job: WriteJob, job_timeout: Duration, counters: &Counters) {
    match tokio::time::timeout(job_timeout, cache.store(&job.records, job.category)).await {
        Ok(written) => {
            Counters::bump(&counters.completed, 1);
            Counters::bump(&counters.written, written as u64);
            tracing::debug!(category = %job.category, records = job.records.len(), written, "cache write finished");
        }
        Err(_) => {
            Counters::bump(&counters.failed, 1);
            tracing::warn!(category = %job.category, timeout_ms = job_timeout.as_millis() as u64, "cache write timed out");
        }
    }
}

fn reap(counters: &Counters, result: Result<(), JoinError>) {
    if let Err(e) = result {
        Counters::bump(&counters.failed, 1);
        tracing::warn!(error = %e, "cache write task failed");
    }
}
