//! Structured job logging utilities.

use reel_models::{JobId, StageKind};
use tracing::{debug, error, info, warn, Span};

/// Job-scoped logger with consistent fields.
///
/// Step detail goes to `debug!` unless the job runs verbose, in which case it
/// is promoted to `info!`.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    verbose: bool,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Step detail, visible at info level for verbose jobs.
    pub fn log_step(&self, stage: StageKind, message: &str) {
        if self.verbose {
            info!(job_id = %self.job_id, stage = %stage, "{}", message);
        } else {
            debug!(job_id = %self.job_id, stage = %stage, "{}", message);
        }
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Span carrying the job id, entered for the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
