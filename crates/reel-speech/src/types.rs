//! Speech backend request/response types.

use reel_models::CaptionSegment;
use serde::{Deserialize, Serialize};

/// Body of a text-to-speech request.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub voice_settings: VoiceSettings,
}

/// Voice tuning sent with every synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

/// Response from the alignment service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignResponse {
    /// Language the transcriber detected
    #[serde(default)]
    pub language: Option<String>,
    /// Word-level timings
    #[serde(default)]
    pub word_segments: Vec<CaptionSegment>,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
