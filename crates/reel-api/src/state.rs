//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use reel_pipeline::{Pipeline, PipelineConfig, PipelineResult};
use tracing::warn;

use crate::config::ApiConfig;
use crate::registry::JobRegistry;
use crate::services::RetentionSweeper;
use crate::worker::WorkerPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub registry: Arc<JobRegistry>,
    pub pipeline: Arc<Pipeline>,
    pub workers: WorkerPool,
}

impl AppState {
    pub fn new(config: ApiConfig, pipeline: Arc<Pipeline>) -> Self {
        let registry = Arc::new(JobRegistry::from_config(&config));
        let workers = WorkerPool::new(config.worker_count, Arc::clone(&registry), Arc::clone(&pipeline));
        Self {
            config: Arc::new(config),
            registry,
            pipeline,
            workers,
        }
    }

    /// Production state: pipeline stages configured from the environment.
    pub fn from_env(config: ApiConfig) -> PipelineResult<Self> {
        let pipeline = Pipeline::from_config(server_pipeline_config(PipelineConfig::from_env()))?;
        Ok(Self::new(config, Arc::new(pipeline)))
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Output directory an API job writes to; always keyed by job id.
    pub fn output_dir_for(&self, job_id: &str) -> PathBuf {
        self.pipeline_config().output_root.join(job_id)
    }

    pub fn staging_dir_for(&self, job_id: &str) -> PathBuf {
        self.config.jobs_dir.join(job_id)
    }

    /// Sweeper over every root a job can leave directories in.
    pub fn retention_sweeper(&self) -> RetentionSweeper {
        let pipeline = self.pipeline_config();
        RetentionSweeper::new(
            Arc::clone(&self.registry),
            vec![
                pipeline.output_root.clone(),
                pipeline.temp_root.clone(),
                self.config.jobs_dir.clone(),
            ],
            self.config.retention_age,
            self.config.sweep_interval,
        )
    }
}

/// Pipeline settings for concurrent server use.
///
/// Count-based pruning of the output root (`CLEANUP_OLD`) would delete the
/// directories of jobs other workers are still writing; the server relies on
/// the registry-aware retention sweep instead.
pub fn server_pipeline_config(mut config: PipelineConfig) -> PipelineConfig {
    if config.cleanup_old > 0 {
        warn!(
            cleanup_old = config.cleanup_old,
            "CLEANUP_OLD is ignored by the API server; retention sweep handles expiry"
        );
        config.cleanup_old = 0;
    }
    config
}
