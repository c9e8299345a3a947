//! Stage seams and their production implementations.
//!
//! The orchestrator only talks to these traits; tests substitute fakes.

use std::path::Path;

use async_trait::async_trait;
use reel_media::{composite, compress_video, generate_thumbnail, CompositeRequest, FfmpegRunner, WatermarkConfig};
use reel_speech::{AlignClient, TtsClient};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Renders script text to the voiceover WAV.
#[async_trait]
pub trait VoiceStage: Send + Sync {
    async fn synthesize(&self, text: &str, out_path: &Path, test_mode: bool) -> PipelineResult<()>;

    /// Voice identifier recorded in metadata.
    fn voice_id(&self) -> &str;
}

/// Turns the voiceover into a caption track.
#[async_trait]
pub trait AlignStage: Send + Sync {
    async fn align(&self, audio_path: &Path, out_path: &Path, test_mode: bool, model_size: &str) -> PipelineResult<()>;
}

/// Video rendering: the composite plus the optional post-stages.
#[async_trait]
pub trait RenderStage: Send + Sync {
    async fn composite(&self, background: &Path, audio: &Path, captions: &Path, output: &Path) -> PipelineResult<()>;

    async fn thumbnail(&self, video: &Path, output: &Path, title: &str) -> PipelineResult<()>;

    async fn compress(&self, video: &Path, output: &Path) -> PipelineResult<()>;
}

/// Voice stage backed by the TTS client.
pub struct SpeechVoice {
    client: TtsClient,
}

impl SpeechVoice {
    pub fn new(client: TtsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VoiceStage for SpeechVoice {
    async fn synthesize(&self, text: &str, out_path: &Path, test_mode: bool) -> PipelineResult<()> {
        self.client
            .synthesize(text, out_path, test_mode)
            .await
            .map_err(|e| PipelineError::VoiceSynthesis(e.to_string()))
    }

    fn voice_id(&self) -> &str {
        self.client.voice_id()
    }
}

/// Alignment stage backed by the alignment service client.
pub struct SpeechAligner {
    client: AlignClient,
}

impl SpeechAligner {
    pub fn new(client: AlignClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlignStage for SpeechAligner {
    async fn align(&self, audio_path: &Path, out_path: &Path, test_mode: bool, model_size: &str) -> PipelineResult<()> {
        self.client
            .align(audio_path, out_path, test_mode, model_size)
            .await
            .map_err(|e| PipelineError::Alignment(e.to_string()))
    }
}

/// Render stage backed by ffmpeg.
pub struct FfmpegRender {
    runner: FfmpegRunner,
    watermark: WatermarkConfig,
}

impl FfmpegRender {
    pub fn new(runner: FfmpegRunner, watermark: WatermarkConfig) -> Self {
        Self { runner, watermark }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let watermark = match &config.watermark_path {
            Some(path) => WatermarkConfig::default().with_image_path(path),
            None => WatermarkConfig::default(),
        };
        Self::new(FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs), watermark)
    }
}

#[async_trait]
impl RenderStage for FfmpegRender {
    async fn composite(&self, background: &Path, audio: &Path, captions: &Path, output: &Path) -> PipelineResult<()> {
        let request =
            CompositeRequest::new(background, audio, captions, output).with_watermark(self.watermark.clone());
        composite(&request, &self.runner)
            .await
            .map_err(|e| PipelineError::Composite(e.summary()))
    }

    async fn thumbnail(&self, video: &Path, output: &Path, title: &str) -> PipelineResult<()> {
        generate_thumbnail(video, output, title, &self.runner)
            .await
            .map_err(|e| PipelineError::Thumbnail(e.summary()))
    }

    async fn compress(&self, video: &Path, output: &Path) -> PipelineResult<()> {
        compress_video(video, output, &self.runner)
            .await
            .map_err(|e| PipelineError::Compress(e.summary()))
    }
}
