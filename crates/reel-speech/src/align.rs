//! Speech alignment client.
//!
//! The alignment service transcribes the voiceover and returns word-level
//! timings, which are rendered into the caption track.

use std::path::Path;
use std::time::Duration;

use reel_media::write_caption_track;
use reel_models::CaptionSegment;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{SpeechError, SpeechResult};
use crate::retry::{with_retry, MAX_RETRIES};
use crate::types::{AlignResponse, HealthResponse};

const DEFAULT_BASE_URL: &str = "http://localhost:8002";
const DEFAULT_TIMEOUT_SECS: u64 = 900;

/// Fixed segments used instead of a real alignment in test mode.
pub fn placeholder_segments() -> Vec<CaptionSegment> {
    vec![
        CaptionSegment::new(0.0, 0.5, "test"),
        CaptionSegment::new(0.5, 1.0, "caption"),
        CaptionSegment::new(1.0, 1.5, "track"),
    ]
}

/// Configuration for the alignment client.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    pub base_url: String,
    /// Transcription plus alignment of long audio is slow
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 1,
        }
    }
}

impl AlignConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ALIGN_SERVICE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("ALIGN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            max_retries: std::env::var("ALIGN_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .map_or(1, |n| n.min(MAX_RETRIES)),
        }
    }
}

/// Client for the alignment service.
pub struct AlignClient {
    http: Client,
    config: AlignConfig,
}

impl AlignClient {
    pub fn new(config: AlignConfig) -> SpeechResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SpeechError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> SpeechResult<Self> {
        Self::new(AlignConfig::from_env())
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Check if the alignment service is healthy.
    pub async fn health_check(&self) -> SpeechResult<bool> {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await.map_err(SpeechError::Network)?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Alignment service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Alignment service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Align `audio_path` and write the caption track to `out_path`.
    pub async fn align(
        &self,
        audio_path: &Path,
        out_path: &Path,
        test_mode: bool,
        model_size: &str,
    ) -> SpeechResult<()> {
        let segments = if test_mode {
            debug!("Using placeholder caption segments");
            placeholder_segments()
        } else {
            let response = self.transcribe(audio_path, model_size).await?;
            info!(
                segments = response.word_segments.len(),
                language = response.language.as_deref().unwrap_or("unknown"),
                "Alignment complete"
            );
            response.word_segments
        };

        write_caption_track(&segments, out_path).await?;
        Ok(())
    }

    /// Upload the audio and return the service's word timings.
    pub async fn transcribe(&self, audio_path: &Path, model_size: &str) -> SpeechResult<AlignResponse> {
        let audio = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "voice.wav".to_string());
        let url = format!("{}/align", self.config.base_url.trim_end_matches('/'));
        let timeout_secs = self.config.timeout.as_secs();

        debug!("Sending alignment request to {}", url);

        let response: AlignResponse = with_retry("Alignment", self.config.max_retries, || async {
            let part = Part::bytes(audio.clone())
                .file_name(file_name.clone())
                .mime_str("audio/wav")
                .map_err(SpeechError::Network)?;
            let form = Form::new()
                .part("audio", part)
                .text("model_size", model_size.to_string());

            let response = self
                .http
                .post(&url)
                .multipart(form)
                .send()
                .await
                .map_err(|e| SpeechError::from_reqwest(e, timeout_secs))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SpeechError::from_status(status, &body));
            }

            let body = response
                .text()
                .await
                .map_err(|e| SpeechError::from_reqwest(e, timeout_secs))?;
            Ok(serde_json::from_str(&body)?)
        })
        .await?;

        if response.word_segments.is_empty() {
            return Err(SpeechError::InvalidResponse(
                "alignment returned no word segments".to_string(),
            ));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_track() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("subtitles.ass");
        let client = AlignClient::new(AlignConfig::default()).unwrap();

        // Audio is not read in test mode
        client
            .align(&dir.path().join("missing.wav"), &out, true, "base")
            .await
            .unwrap();

        let doc = std::fs::read_to_string(&out).unwrap();
        let events = doc.lines().filter(|l| l.starts_with("Dialogue:")).count();
        assert_eq!(events, 3);
        assert!(doc.contains(",track"));
    }

    #[test]
    fn test_config_defaults() {
        let config = AlignConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(900));
    }
}
