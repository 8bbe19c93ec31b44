//! Job queue: worker pool, per-key serialization, retry, and submission.
//!
//! Shutdown: [`JobQueue::shutdown`] stops accepting new jobs, runs every job that was
//! already submitted (including pending retries) and returns once the pool is idle.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;

use vignette_core::{JobError, JobKey, QueueConfig, ThumbnailJob};

use crate::context::{JobHandler, JobOutcome};
use crate::scheduler::{JobSink, Scheduler};

/// Maximum delay in retry units before retrying a failed job. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: i32) -> u64 {
    2_u64
        .checked_pow(retry_count.max(0) as u32)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Clone, Debug)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub max_retries: i32,
    /// Upper bound for a single attempt; an attempt that runs longer is retried.
    pub job_timeout: Duration,
    /// One backoff second. Shortened in tests.
    pub retry_delay_unit: Duration,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for JobQueueConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_workers: config.max_workers.max(1),
            max_retries: config.max_retries,
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            retry_delay_unit: Duration::from_secs(1),
        }
    }
}

/// Counters over the lifetime of a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub generated: u64,
    pub skipped: u64,
    pub retried: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    generated: AtomicU64,
    skipped: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            generated: self.generated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// One async mutex per job key, so that two runs for the same item and thumbnail
/// never overlap. Entries are removed once nobody holds or waits for them.
#[derive(Default)]
struct KeyLocks {
    locks: StdMutex<HashMap<JobKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(self: &Arc<Self>, key: &JobKey) -> KeyGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let guard = lock.lock_owned().await;

        KeyGuard {
            locks: Arc::clone(self),
            key: key.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct KeyGuard {
    locks: Arc<KeyLocks>,
    key: JobKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self
            .locks
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// In-process queue running thumbnail jobs on a bounded worker pool.
#[derive(Clone)]
pub struct JobQueue {
    config: JobQueueConfig,
    job_tx: mpsc::UnboundedSender<ThumbnailJob>,
    shutdown_tx: mpsc::Sender<()>,
    pool: Arc<Mutex<Option<JoinHandle<()>>>>,
    counters: Arc<Counters>,
}

impl JobQueue {
    /// Create a new JobQueue and start its worker pool.
    ///
    /// The queue only holds a weak reference to `handler`; once the handler is dropped
    /// every remaining job fails without retry. Must be called inside a tokio runtime.
    pub fn new(config: JobQueueConfig, handler: Weak<dyn JobHandler>) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let counters = Arc::new(Counters::default());

        let pool = tokio::spawn(Self::worker_pool(
            job_rx,
            shutdown_rx,
            handler,
            config.clone(),
            Arc::clone(&counters),
        ));

        Self {
            config,
            job_tx,
            shutdown_tx,
            pool: Arc::new(Mutex::new(Some(pool))),
            counters,
        }
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// Hand a job to the worker pool. Fails once the queue has shut down.
    pub fn enqueue(&self, job: ThumbnailJob) -> Result<()> {
        let job_id = job.id;
        let display_name = job.display_name.clone();

        self.job_tx
            .send(job)
            .map_err(|_| anyhow!("Job queue is shut down"))?;
        Counters::bump(&self.counters.submitted);

        tracing::info!(job_id = %job_id, job = %display_name, "Job submitted");
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }

    async fn worker_pool(
        mut job_rx: mpsc::UnboundedReceiver<ThumbnailJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
        handler: Weak<dyn JobHandler>,
        config: JobQueueConfig,
        counters: Arc<Counters>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            max_retries = config.max_retries,
            job_timeout_secs = config.job_timeout.as_secs(),
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let key_locks = Arc::new(KeyLocks::default());
        let mut running = JoinSet::new();

        let spawn_job = |running: &mut JoinSet<()>, job: ThumbnailJob| {
            running.spawn(Self::process_job_with_retry(
                job,
                handler.clone(),
                config.clone(),
                Arc::clone(&semaphore),
                Arc::clone(&key_locks),
                Arc::clone(&counters),
            ));
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                job = job_rx.recv() => match job {
                    Some(job) => spawn_job(&mut running, job),
                    None => break,
                },
                Some(result) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Job task aborted");
                    }
                }
            }
        }

        // Run what was accepted before the queue closed.
        job_rx.close();
        while let Some(job) = job_rx.recv().await {
            spawn_job(&mut running, job);
        }
        while let Some(result) = running.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job task aborted");
            }
        }

        tracing::info!("Job queue worker pool stopped");
    }

    #[tracing::instrument(skip_all, fields(job_id = %job.id, key = %job.key()))]
    async fn process_job_with_retry(
        mut job: ThumbnailJob,
        handler: Weak<dyn JobHandler>,
        config: JobQueueConfig,
        semaphore: Arc<Semaphore>,
        key_locks: Arc<KeyLocks>,
        counters: Arc<Counters>,
    ) {
        loop {
            let result = {
                let _key_guard = key_locks.acquire(&job.key()).await;
                let _permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::error!("Worker pool closed before the job could run");
                        Counters::bump(&counters.failed);
                        return;
                    }
                };
                Self::run_attempt(&job, &handler, config.job_timeout).await
            };

            match result {
                Ok(outcome) => {
                    match outcome {
                        JobOutcome::Generated => Counters::bump(&counters.generated),
                        JobOutcome::Skipped => Counters::bump(&counters.skipped),
                    }
                    tracing::info!(
                        job = %job.display_name,
                        outcome = %outcome,
                        retry_count = job.retry_count,
                        "Job completed"
                    );
                    return;
                }
                Err(e) if !e.is_recoverable() => {
                    tracing::error!(
                        job = %job.display_name,
                        error = %e,
                        "Job failed with unrecoverable error, not retrying"
                    );
                    Counters::bump(&counters.failed);
                    return;
                }
                Err(e) if job.can_retry(config.max_retries) => {
                    let backoff = compute_retry_backoff_seconds(job.retry_count);
                    tracing::warn!(
                        job = %job.display_name,
                        error = %e,
                        retry_count = job.retry_count + 1,
                        max_retries = config.max_retries,
                        backoff_secs = backoff,
                        "Job failed, scheduling retry"
                    );
                    Counters::bump(&counters.retried);

                    sleep(config.retry_delay_unit.saturating_mul(backoff as u32)).await;
                    job = job.next_attempt();
                }
                Err(e) => {
                    tracing::error!(
                        job = %job.display_name,
                        error = %e,
                        retry_count = job.retry_count,
                        "Job failed after max retries"
                    );
                    Counters::bump(&counters.failed);
                    return;
                }
            }
        }
    }

    async fn run_attempt(
        job: &ThumbnailJob,
        handler: &Weak<dyn JobHandler>,
        timeout: Duration,
    ) -> Result<JobOutcome, JobError> {
        let Some(handler) = handler.upgrade() else {
            return Err(JobError::unrecoverable(anyhow!(
                "Job handler was dropped before the job could run"
            )));
        };

        match tokio::time::timeout(timeout, handler.handle(job)).await {
            Ok(result) => result,
            Err(_) => Err(JobError::recoverable(anyhow!(
                "Job timed out after {}s",
                timeout.as_secs_f64()
            ))),
        }
    }

    /// Stop accepting jobs and wait until every accepted job has finished.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.try_send(());

        let mut pool = self.pool.lock().await;
        if let Some(handle) = pool.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Job queue worker pool aborted");
            }
        }
    }
}

#[async_trait]
impl JobSink for JobQueue {
    async fn submit(&self, job: ThumbnailJob) -> Result<()> {
        self.enqueue(job)
    }
}

/// Schedules straight onto the queue, without waiting for the end of a request.
#[async_trait]
impl Scheduler for JobQueue {
    async fn schedule(&self, job: ThumbnailJob) -> Result<()> {
        self.enqueue(job)
    }
}
