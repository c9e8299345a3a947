//! Text-to-speech client.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reel_media::{transcode_to_wav, write_silent_wav, FfmpegRunner};
use reel_models::encoding::PLACEHOLDER_AUDIO_SECS;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{SpeechError, SpeechResult};
use crate::retry::{with_retry, MAX_RETRIES};
use crate::types::{SpeechRequest, VoiceSettings};

/// Environment variable holding the TTS credential.
pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the TTS client.
#[derive(Clone)]
pub struct TtsConfig {
    /// Injected credential; never logged
    pub api_key: Option<String>,
    pub voice_id: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub voice_settings: VoiceSettings,
}

impl fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("voice_id", &self.voice_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("voice_settings", &self.voice_settings)
            .finish()
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 1,
            voice_settings: VoiceSettings::default(),
        }
    }
}

impl TtsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            voice_id: std::env::var("ELEVENLABS_VOICE_ID")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
            base_url: std::env::var("ELEVENLABS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("TTS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            max_retries: std::env::var("TTS_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .map_or(1, |n| n.min(MAX_RETRIES)),
            voice_settings: VoiceSettings::default(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Client for the text-to-speech backend.
pub struct TtsClient {
    http: Client,
    config: TtsConfig,
    runner: FfmpegRunner,
}

impl TtsClient {
    pub fn new(config: TtsConfig) -> SpeechResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SpeechError::Network)?;

        Ok(Self {
            http,
            config,
            runner: FfmpegRunner::new(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> SpeechResult<Self> {
        Self::new(TtsConfig::from_env())
    }

    /// Runner used for the MP3 to WAV transcode.
    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    pub fn voice_id(&self) -> &str {
        &self.config.voice_id
    }

    /// Render `text` to a mono 44.1 kHz WAV at `out_path`.
    ///
    /// In test mode a silent placeholder is written and no request is made.
    pub async fn synthesize(&self, text: &str, out_path: &Path, test_mode: bool) -> SpeechResult<()> {
        if test_mode {
            debug!(path = %out_path.display(), "Writing placeholder voiceover");
            write_silent_wav(out_path, PLACEHOLDER_AUDIO_SECS)?;
            return Ok(());
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(SpeechError::MissingCredential(API_KEY_ENV))?;

        if text.trim().is_empty() {
            return Err(SpeechError::RequestFailed("script is empty, nothing to synthesize".to_string()));
        }

        let audio = self.fetch_speech(text, api_key).await?;

        let intermediate = intermediate_path(out_path);
        let result: SpeechResult<()> = async {
            tokio::fs::write(&intermediate, &audio).await?;
            transcode_to_wav(&intermediate, out_path, &self.runner).await?;
            Ok(())
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&intermediate).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %intermediate.display(), "Failed to remove TTS intermediate: {}", e);
            }
        }

        if result.is_ok() {
            info!(path = %out_path.display(), bytes = audio.len(), "Voiceover synthesized");
        }
        result
    }

    /// Request speech audio bytes for `text`.
    pub async fn fetch_speech(&self, text: &str, api_key: &str) -> SpeechResult<Vec<u8>> {
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        );
        let body = SpeechRequest {
            text,
            voice_settings: self.config.voice_settings,
        };
        let timeout_secs = self.config.timeout.as_secs();

        debug!("Sending synthesis request to {}", url);

        let bytes = with_retry("TTS", self.config.max_retries, || async {
            let response = self
                .http
                .post(&url)
                .header("xi-api-key", api_key)
                .header(reqwest::header::ACCEPT, "audio/mpeg")
                .json(&body)
                .send()
                .await
                .map_err(|e| SpeechError::from_reqwest(e, timeout_secs))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SpeechError::from_status(status, &body));
            }

            response
                .bytes()
                .await
                .map_err(|e| SpeechError::from_reqwest(e, timeout_secs))
        })
        .await?;

        if bytes.is_empty() {
            return Err(SpeechError::InvalidResponse("TTS returned no audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

fn intermediate_path(out_path: &Path) -> PathBuf {
    out_path.with_extension("mp3")
}
