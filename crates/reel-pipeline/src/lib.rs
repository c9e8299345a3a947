//! Script-to-reel job pipeline.
//!
//! The [`Pipeline`] turns a text script and a background video into a
//! captioned, voiced vertical video:
//!
//! 1. voice synthesis into `voice.wav`
//! 2. alignment into the `subtitles.ass` caption track
//! 3. compositing into `final.mp4`, plus optional thumbnail and compressed renders
//!
//! Each job owns a temp and an output directory; `metadata.json` and
//! `log.json` are written to the latter.

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod retention;
pub mod script;
pub mod stages;
pub mod store;
pub mod workspace;

pub use config::{parse_flag, PipelineConfig};
pub use error::{InputKind, PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use orchestrator::{Pipeline, PipelineRequest};
pub use retention::{prune_oldest, remove_older_than};
pub use stages::{AlignStage, FfmpegRender, RenderStage, SpeechAligner, SpeechVoice, VoiceStage};
pub use store::{load_log, persist_log, persist_metadata};
pub use workspace::JobWorkspace;
