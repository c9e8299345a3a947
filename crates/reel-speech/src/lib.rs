//! Clients for the speech backends used by the pipeline.
//!
//! - [`TtsClient`] renders script text to a WAV voiceover
//! - [`AlignClient`] turns a voiceover into a word-timed caption track
//!
//! Both have a placeholder mode that makes no network calls.

pub mod align;
pub mod error;
mod retry;
pub mod tts;
pub mod types;

pub use align::{placeholder_segments, AlignClient, AlignConfig};
pub use error::{SpeechError, SpeechResult};
pub use tts::{TtsClient, TtsConfig, API_KEY_ENV};
pub use types::{AlignResponse, VoiceSettings};
