//! Per-job configuration flags.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default alignment model selector.
pub const DEFAULT_MODEL_SIZE: &str = "base";

/// Configuration governing which stages run and how failures propagate.
///
/// Resolved once at submission and threaded through every stage call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct JobFlags {
    /// Skip compositing (and its post-stages)
    #[serde(default)]
    pub dry_run: bool,

    /// Use placeholders for synthesis and alignment
    #[serde(default)]
    pub test_mode: bool,

    /// Promote per-step logging to info
    #[serde(default)]
    pub verbose: bool,

    /// Abort the job on the first stage error
    #[serde(default)]
    pub strict: bool,

    /// Retain the temp workspace after the job
    #[serde(default)]
    pub keep_temp: bool,

    /// Export a still frame with the title drawn on it
    #[serde(default)]
    pub thumbnail: bool,

    /// Produce a bitrate-capped secondary render
    #[serde(default)]
    pub compress: bool,

    /// Alignment model selector
    #[serde(default = "default_model_size")]
    #[validate(length(min = 1, max = 32))]
    pub model_size: String,

    /// Spoken-duration budget in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 3600))]
    pub max_length: Option<u32>,
}

fn default_model_size() -> String {
    DEFAULT_MODEL_SIZE.to_string()
}

impl Default for JobFlags {
    fn default() -> Self {
        Self {
            dry_run: false,
            test_mode: false,
            verbose: false,
            strict: false,
            keep_temp: false,
            thumbnail: false,
            compress: false,
            model_size: default_model_size(),
            max_length: None,
        }
    }
}

impl JobFlags {
    /// Flags for an offline run with placeholder backends.
    pub fn test() -> Self {
        Self {
            test_mode: true,
            ..Default::default()
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::from_strict(self.strict)
    }
}

/// Whether a stage error aborts the job or is only recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the error and keep going
    #[default]
    BestEffort,
    /// Record the error and abort
    Strict,
}

impl FailurePolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            FailurePolicy::Strict
        } else {
            FailurePolicy::BestEffort
        }
    }

    pub fn aborts(&self) -> bool {
        matches!(self, FailurePolicy::Strict)
    }
}
