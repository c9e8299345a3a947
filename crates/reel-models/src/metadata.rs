//! Final job snapshot persisted as `metadata.json`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Job, JobFlags, JobId, JobStatus, OutputKind};

/// Metadata written once at job completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobMetadata {
    pub job_id: JobId,
    pub title: String,
    pub word_count: usize,
    pub char_count: usize,
    pub est_read_time: f64,
    pub language: String,
    /// Script file name
    pub script: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub model_size: String,
    pub voice_id: String,
    /// Voiceover length in seconds, when readable
    pub audio_duration: Option<f64>,
    /// Human readable wall time, e.g. "1m 04.20s"
    pub total_runtime: String,
    pub flags: JobFlags,
    pub status: JobStatus,
    pub output_files: BTreeMap<OutputKind, PathBuf>,
    pub errors: Vec<String>,
}

impl JobMetadata {
    /// Snapshot a terminal job.
    pub fn from_job(
        job: &Job,
        script: impl Into<String>,
        voice_id: impl Into<String>,
        audio_duration: Option<f64>,
    ) -> Self {
        let started_at = job.started_at.unwrap_or_else(Utc::now);
        let completed_at = job.completed_at.unwrap_or_else(Utc::now);
        let duration_seconds = job
            .duration_seconds
            .unwrap_or_else(|| (completed_at - started_at).num_milliseconds() as f64 / 1000.0);

        Self {
            job_id: job.job_id.clone(),
            title: job.title.clone(),
            word_count: job.stats.word_count,
            char_count: job.stats.char_count,
            est_read_time: job.stats.est_read_time,
            language: job.stats.language.clone(),
            script: script.into(),
            started_at,
            completed_at,
            duration_seconds,
            model_size: job.flags.model_size.clone(),
            voice_id: voice_id.into(),
            audio_duration,
            total_runtime: format_runtime(duration_seconds),
            flags: job.flags.clone(),
            status: job.status,
            output_files: job.output_files.clone(),
            errors: job.errors.clone(),
        }
    }
}

/// Format seconds as `"12.34s"` or `"3m 04.50s"`.
pub fn format_runtime(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = seconds - (minutes as f64 * 60.0);
    if minutes == 0 {
        format!("{:.2}s", rest)
    } else {
        format!("{}m {:05.2}s", minutes, rest)
    }
}
