//! Structured per-job log persisted as `log.json`.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::JobId;

/// One discrete unit of orchestrated work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Synthesis,
    Alignment,
    Composite,
    Thumbnail,
    Compress,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Synthesis => "synthesis",
            StageKind::Alignment => "alignment",
            StageKind::Composite => "composite",
            StageKind::Thumbnail => "thumbnail",
            StageKind::Compress => "compress",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// Record of a single stage execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepRecord {
    pub stage: StageKind,
    pub outcome: StepOutcome,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Job log: stage steps plus the ordered error list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobLog {
    pub job_id: JobId,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl JobLog {
    pub fn init(job_id: JobId, test_mode: bool) -> Self {
        Self {
            job_id,
            test_mode,
            created_at: Utc::now(),
            steps: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn append_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn record_step(
        &mut self,
        stage: StageKind,
        outcome: StepOutcome,
        elapsed_ms: u64,
        message: Option<String>,
    ) {
        self.steps.push(StepRecord {
            stage,
            outcome,
            elapsed_ms,
            message,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
