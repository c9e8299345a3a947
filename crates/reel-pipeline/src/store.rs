//! Atomic persistence of `log.json` and `metadata.json`.

use std::path::{Path, PathBuf};

use reel_models::{JobLog, JobMetadata, OutputKind};
use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Serialize `value` to `<dir>/<file_name>` via a `.tmp` sibling and rename.
async fn write_json_atomic<T: Serialize>(value: &T, dir: &Path, file_name: &str) -> PipelineResult<PathBuf> {
    let target = dir.join(file_name);
    let tmp = dir.join(format!("{file_name}.tmp"));
    let body = serde_json::to_vec_pretty(value)?;

    tokio::fs::write(&tmp, &body)
        .await
        .map_err(|e| PipelineError::workspace(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, &target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PipelineError::workspace(&target, e));
    }

    debug!(path = %target.display(), bytes = body.len(), "Persisted");
    Ok(target)
}

pub async fn persist_log(log: &JobLog, dir: &Path) -> PipelineResult<PathBuf> {
    write_json_atomic(log, dir, OutputKind::Log.file_name()).await
}

pub async fn persist_metadata(metadata: &JobMetadata, dir: &Path) -> PipelineResult<PathBuf> {
    write_json_atomic(metadata, dir, OutputKind::Metadata.file_name()).await
}

pub async fn load_log(dir: &Path) -> PipelineResult<JobLog> {
    let raw = tokio::fs::read(dir.join(OutputKind::Log.file_name())).await?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use reel_models::{JobFlags, JobId, StageKind, StepOutcome};

    use super::*;

    #[tokio::test]
    async fn test_persist_log_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JobLog::init(JobId::from_string("j1"), true);
        log.record_step(StageKind::Synthesis, StepOutcome::Succeeded, 12, None);
        log.append_error("alignment failed");

        let path = persist_log(&log, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("log.json"));
        assert!(!dir.path().join("log.json.tmp").exists());

        let loaded = load_log(dir.path()).await.unwrap();
        assert_eq!(loaded.errors, vec!["alignment failed".to_string()]);
        assert_eq!(loaded.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = reel_models::Job::new(JobId::from_string("j2"), JobFlags::test());
        job.start();
        job.complete();
        let meta = JobMetadata::from_job(&job, "script.txt", "voice", Some(2.0));

        persist_metadata(&meta, dir.path()).await.unwrap();
        let raw = std::fs::read_to_string(dir.path().join("metadata.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["job_id"], "j2");
        assert_eq!(value["status"], "complete");
    }

    #[tokio::test]
    async fn test_persist_into_missing_dir_is_workspace_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = JobLog::init(JobId::from_string("j3"), false);
        let err = persist_log(&log, &dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Workspace { .. }));
    }
}
