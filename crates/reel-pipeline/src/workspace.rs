//! Per-job temp and output directories.

use std::path::{Path, PathBuf};

use reel_models::{JobId, OutputKind};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// The temp + output directory pair owned by one job.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl JobWorkspace {
    /// Resolve directories without touching the filesystem.
    ///
    /// Output: explicit dir, else `<output_root>/<job_id>` for caller-supplied
    /// ids, else `<output_root>/<slug>`. Temp is always keyed by job id.
    pub fn resolve(
        config: &PipelineConfig,
        job_id: &JobId,
        supplied_id: bool,
        explicit_output: Option<&Path>,
        slug: &str,
    ) -> Self {
        let output_dir = match explicit_output {
            Some(dir) => dir.to_path_buf(),
            None if supplied_id => config.output_root.join(job_id.as_str()),
            None => config.output_root.join(slug),
        };
        Self {
            temp_dir: config.temp_root.join(job_id.as_str()),
            output_dir,
        }
    }

    pub async fn create(&self) -> PipelineResult<()> {
        for dir in [&self.temp_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::workspace(dir, e))?;
        }
        debug!(temp = %self.temp_dir.display(), output = %self.output_dir.display(), "Workspace ready");
        Ok(())
    }

    /// Fixed location of an artifact.
    pub fn path(&self, kind: OutputKind) -> PathBuf {
        let dir = if kind.is_intermediate() {
            &self.temp_dir
        } else {
            &self.output_dir
        };
        dir.join(kind.file_name())
    }

    /// Remove the temp directory. Failures are logged, not returned.
    pub async fn cleanup_temp(&self) {
        match tokio::fs::remove_dir_all(&self.temp_dir).await {
            Ok(()) => debug!(path = %self.temp_dir.display(), "Removed temp dir"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.temp_dir.display(), "Failed to remove temp dir: {}", e),
        }
    }
}
