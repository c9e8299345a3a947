//! Bounded worker pool executing pipeline jobs off the request path.

use std::sync::Arc;

use reel_models::JobId;
use reel_pipeline::{Pipeline, PipelineRequest};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use crate::metrics;
use crate::registry::JobRegistry;

/// Semaphore-bounded job executor.
///
/// Every dispatched job gets its own task; at most `size` of them hold a
/// permit and run the pipeline at once, the rest wait in `queued`.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    registry: Arc<JobRegistry>,
    pipeline: Arc<Pipeline>,
}

impl WorkerPool {
    pub fn new(size: usize, registry: Arc<JobRegistry>, pipeline: Arc<Pipeline>) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            registry,
            pipeline,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers currently running a job.
    pub fn busy(&self) -> usize {
        self.size - self.permits.available_permits()
    }

    /// Run an already-registered job once a worker frees up.
    pub fn dispatch(&self, job_id: JobId, request: PipelineRequest) -> JoinHandle<()> {
        let pool = self.clone();
        let span = tracing::info_span!("job_worker", job_id = %job_id);
        tokio::spawn(async move { pool.execute(job_id, request).await }.instrument(span))
    }

    async fn execute(&self, job_id: JobId, request: PipelineRequest) {
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.registry.fail(&job_id, "worker pool shut down").await;
                return;
            }
        };

        if !self.registry.mark_running(&job_id).await {
            warn!("Job is no longer queued, skipping");
            return;
        }
        metrics::job_started();
        info!("Job started");

        match self.pipeline.run(request).await {
            Ok(job) => {
                let clean = job.is_clean();
                let duration = job.duration_seconds.unwrap_or_default();
                info!(errors = job.errors.len(), duration_secs = duration, "Job complete");
                metrics::record_job_completed(clean, duration);
                self.registry.finish(job).await;
            }
            Err(e) => {
                error!("Job failed: {}", e);
                metrics::record_job_failed();
                self.registry.fail(&job_id, e.to_string()).await;
            }
        }
        metrics::job_finished();
    }
}
