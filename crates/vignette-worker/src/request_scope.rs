//! End-of-request scheduling
//!
//! Content events fire many times while one request saves an item (create, set
//! properties, upload data). Jobs scheduled during the request are collected here and
//! handed to the [`JobSink`] once, after the request has finished, keeping only the
//! first job per item and thumbnail name.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use vignette_core::{JobKey, ThumbnailJob};

use crate::scheduler::{JobSink, Scheduler};

#[derive(Default)]
struct Pending {
    jobs: Vec<ThumbnailJob>,
    keys: HashSet<JobKey>,
}

/// Scheduler bound to a single request.
pub struct EndOfRequestScheduler {
    sink: Arc<dyn JobSink>,
    pending: Mutex<Pending>,
}

impl EndOfRequestScheduler {
    pub fn new(sink: Arc<dyn JobSink>) -> Self {
        Self {
            sink,
            pending: Mutex::new(Pending::default()),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of jobs waiting for the end of the request.
    pub fn pending_count(&self) -> usize {
        self.pending().jobs.len()
    }

    /// Submit the collected jobs, in scheduling order.
    ///
    /// Returns how many were accepted by the sink. A rejected job is logged and does
    /// not stop the others.
    pub async fn complete(&self) -> usize {
        let jobs = {
            let mut pending = self.pending();
            pending.keys.clear();
            std::mem::take(&mut pending.jobs)
        };

        let mut submitted = 0;
        for job in jobs {
            let job_id = job.id;
            let display_name = job.display_name.clone();
            match self.sink.submit(job).await {
                Ok(()) => submitted += 1,
                Err(e) => {
                    tracing::error!(
                        job_id = %job_id,
                        job = %display_name,
                        error = %e,
                        "Failed to submit thumbnail job"
                    );
                }
            }
        }
        submitted
    }

    /// Drop the collected jobs, e.g. when the request failed.
    pub fn discard(&self) -> usize {
        let mut pending = self.pending();
        pending.keys.clear();
        let count = pending.jobs.len();
        pending.jobs.clear();
        count
    }
}

#[async_trait]
impl Scheduler for EndOfRequestScheduler {
    async fn schedule(&self, job: ThumbnailJob) -> anyhow::Result<()> {
        let mut pending = self.pending();
        if !pending.keys.insert(job.key()) {
            tracing::debug!(
                key = %job.key(),
                "Thumbnail job already scheduled for this request"
            );
            return Ok(());
        }

        tracing::debug!(job_id = %job.id, job = %job.display_name, "Thumbnail job scheduled");
        pending.jobs.push(job);
        Ok(())
    }
}

impl Drop for EndOfRequestScheduler {
    fn drop(&mut self) {
        let count = self.pending().jobs.len();
        if count > 0 {
            tracing::warn!(count, "Request scope dropped with unsubmitted thumbnail jobs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vignette_core::{GenerationParams, ItemRef, ThumbnailDimensions};

    #[derive(Default)]
    struct CollectingSink {
        jobs: Mutex<Vec<ThumbnailJob>>,
        reject: bool,
    }

    #[async_trait]
    impl JobSink for CollectingSink {
        async fn submit(&self, job: ThumbnailJob) -> anyhow::Result<()> {
            if self.reject {
                anyhow::bail!("queue closed");
            }
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    fn document_job(id: &str, name: &str) -> ThumbnailJob {
        ThumbnailJob::new(
            ItemRef::new(id, "default"),
            "report.docx",
            name,
            GenerationParams::Document { size: 150 },
        )
    }

    #[tokio::test]
    async fn test_duplicate_requests_collapse() {
        let sink = Arc::new(CollectingSink::default());
        let scope = EndOfRequestScheduler::new(sink.clone());

        scope.schedule(document_job("a", "thumbnail")).await.unwrap();
        scope.schedule(document_job("a", "thumbnail")).await.unwrap();
        scope.schedule(document_job("a", "thumbnail")).await.unwrap();
        assert_eq!(scope.pending_count(), 1);

        assert_eq!(scope.complete().await, 1);
        assert_eq!(sink.jobs.lock().unwrap().len(), 1);
        assert_eq!(scope.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_first_request_wins() {
        let sink = Arc::new(CollectingSink::default());
        let scope = EndOfRequestScheduler::new(sink.clone());

        let first = document_job("a", "thumbnail");
        let first_id = first.id;
        scope.schedule(first).await.unwrap();
        scope
            .schedule(ThumbnailJob::new(
                ItemRef::new("a", "default"),
                "report.docx",
                "thumbnail",
                GenerationParams::Video {
                    offset_seconds: 1,
                    size: ThumbnailDimensions::new(320, 240),
                },
            ))
            .await
            .unwrap();

        scope.complete().await;
        let jobs = sink.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, first_id);
    }

    #[tokio::test]
    async fn test_distinct_keys_kept_in_order() {
        let sink = Arc::new(CollectingSink::default());
        let scope = EndOfRequestScheduler::new(sink.clone());

        scope.schedule(document_job("a", "thumbnail")).await.unwrap();
        scope.schedule(document_job("a", "preview")).await.unwrap();
        scope.schedule(document_job("b", "thumbnail")).await.unwrap();

        assert_eq!(scope.complete().await, 3);
        let names: Vec<String> = sink
            .jobs
            .lock()
            .unwrap()
            .iter()
            .map(|job| job.key().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["default:a/thumbnail", "default:a/preview", "default:b/thumbnail"]
        );
    }

    #[tokio::test]
    async fn test_rejected_jobs_are_counted_out() {
        let sink = Arc::new(CollectingSink {
            reject: true,
            ..Default::default()
        });
        let scope = EndOfRequestScheduler::new(sink);

        scope.schedule(document_job("a", "thumbnail")).await.unwrap();
        assert_eq!(scope.complete().await, 0);
        assert_eq!(scope.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_discard() {
        let sink = Arc::new(CollectingSink::default());
        let scope = EndOfRequestScheduler::new(sink.clone());

        scope.schedule(document_job("a", "thumbnail")).await.unwrap();
        assert_eq!(scope.discard(), 1);
        assert_eq!(scope.complete().await, 0);
        assert!(sink.jobs.lock().unwrap().is_empty());
    }
}
