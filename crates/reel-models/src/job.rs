//! Job definitions and lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{JobFlags, OutputKind};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID (hex, no dashes).
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be used as a single path component.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 128
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a worker
    #[default]
    Queued,
    /// An orchestrator pass owns the job
    Running,
    /// Pipeline ran to the end (errors may still be recorded)
    Complete,
    /// Pipeline aborted
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics derived from the input script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptStats {
    pub word_count: usize,
    pub char_count: usize,
    /// Estimated read time in seconds
    pub est_read_time: f64,
    /// Detected language code, or "unknown"
    pub language: String,
}

impl Default for ScriptStats {
    fn default() -> Self {
        Self {
            word_count: 0,
            char_count: 0,
            est_read_time: 0.0,
            language: "unknown".to_string(),
        }
    }
}

/// A unit of orchestrated work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub job_id: JobId,

    /// First non-empty line of the script
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub stats: ScriptStats,

    pub flags: JobFlags,

    #[serde(default)]
    pub status: JobStatus,

    /// Artifact kind -> location on disk
    #[serde(default)]
    pub output_files: BTreeMap<OutputKind, PathBuf>,

    /// Ordered stage failure messages
    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl Job {
    /// Create a queued job.
    pub fn new(job_id: JobId, flags: JobFlags) -> Self {
        Self {
            job_id,
            title: String::new(),
            stats: ScriptStats::default(),
            flags,
            status: JobStatus::Queued,
            output_files: BTreeMap::new(),
            errors: Vec::new(),
            started_at: None,
            completed_at: None,
            duration_seconds: None,
        }
    }

    /// Move to `running`. Returns false if the job was not queued.
    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Append a stage failure message.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Register an artifact location.
    pub fn set_output(&mut self, kind: OutputKind, path: impl Into<PathBuf>) {
        self.output_files.insert(kind, path.into());
    }

    pub fn output(&self, kind: OutputKind) -> Option<&PathBuf> {
        self.output_files.get(&kind)
    }

    /// Mark the job complete. No-op once terminal.
    pub fn complete(&mut self) {
        self.finish(JobStatus::Complete);
    }

    /// Mark the job failed, recording the reason. No-op once terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let error = error.into();
        if self.errors.last() != Some(&error) {
            self.errors.push(error);
        }
        self.finish(JobStatus::Failed);
    }

    fn finish(&mut self, status: JobStatus) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        let started = *self.started_at.get_or_insert(now);
        self.status = status;
        self.completed_at = Some(now);
        self.duration_seconds = Some((now - started).num_milliseconds() as f64 / 1000.0);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the job finished with an empty error list.
    pub fn is_clean(&self) -> bool {
        self.status == JobStatus::Complete && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_is_hex() {
        let id = JobId::new();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.is_path_safe());
        assert!(!JobId::from_string("../etc").is_path_safe());
        assert!(!JobId::from_string("").is_path_safe());
    }

    #[test]
    fn test_lifecycle() {
        let mut job = Job::new(JobId::new(), JobFlags::default());
        assert_eq!(job.status, JobStatus::Queued);

        assert!(job.start());
        assert!(!job.start());
        assert_eq!(job.status, JobStatus::Running);

        job.record_error("alignment failed");
        job.complete();
        assert_eq!(job.status, JobStatus::Complete);
        assert!(!job.is_clean());
        assert!(job.completed_at.is_some());
        assert!(job.duration_seconds.unwrap() >= 0.0);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut job = Job::new(JobId::new(), JobFlags::default());
        job.start();
        job.fail("boom");
        job.complete();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&JobStatus::Complete).unwrap(), "\"complete\"");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
