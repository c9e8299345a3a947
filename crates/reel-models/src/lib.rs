//! Shared data models for the reel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle status and derived script statistics
//! - Per-job configuration flags and the failure policy
//! - Caption segments produced by alignment
//! - Output artifact kinds and the persisted metadata / job log records
//! - Encoding constants shared by the media stages

pub mod caption;
pub mod encoding;
pub mod flags;
pub mod job;
pub mod job_log;
pub mod metadata;
pub mod output;

// Re-export common types
pub use caption::CaptionSegment;
pub use encoding::EncodingConfig;
pub use flags::{FailurePolicy, JobFlags, DEFAULT_MODEL_SIZE};
pub use job::{Job, JobId, JobStatus, ScriptStats};
pub use job_log::{JobLog, StageKind, StepOutcome, StepRecord};
pub use metadata::JobMetadata;
pub use output::OutputKind;
