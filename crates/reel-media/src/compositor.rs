//! Final render: background + voiceover + burned captions + watermark.

use std::path::{Path, PathBuf};

use reel_models::encoding::{OUTPUT_HEIGHT, OUTPUT_WIDTH};
use reel_models::EncodingConfig;
use tracing::{debug, info, warn};

use crate::command::{quote_filter_path, FfmpegCommand, FfmpegRunner};
use crate::error::{require_file, MediaInput, MediaResult};
use crate::watermark::WatermarkConfig;

/// Inputs and destination of one compositing pass.
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub background: PathBuf,
    pub audio: PathBuf,
    pub captions: PathBuf,
    pub output: PathBuf,
    pub watermark: WatermarkConfig,
    pub encoding: EncodingConfig,
}

impl CompositeRequest {
    pub fn new(
        background: impl Into<PathBuf>,
        audio: impl Into<PathBuf>,
        captions: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            background: background.into(),
            audio: audio.into(),
            captions: captions.into(),
            output: output.into(),
            watermark: WatermarkConfig::default(),
            encoding: EncodingConfig::default(),
        }
    }

    pub fn with_watermark(mut self, watermark: WatermarkConfig) -> Self {
        self.watermark = watermark;
        self
    }

    /// Check every input exists.
    pub fn validate(&self) -> MediaResult<()> {
        require_file(MediaInput::Background, &self.background)?;
        require_file(MediaInput::Audio, &self.audio)?;
        require_file(MediaInput::Captions, &self.captions)?;
        Ok(())
    }

    /// Video filter graph ending in `[v]`.
    pub fn filter_graph(&self, with_watermark: bool) -> String {
        let base = format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,ass={ass}",
            w = OUTPUT_WIDTH,
            h = OUTPUT_HEIGHT,
            ass = quote_filter_path(&self.captions),
        );
        if with_watermark {
            format!("{base}[captioned];{}", self.watermark.overlay_chain(2, "captioned", "v"))
        } else {
            format!("{base}[v]")
        }
    }

    fn build_command(&self) -> FfmpegCommand {
        let with_watermark = self.watermark.is_available();
        if !with_watermark {
            debug!(path = %self.watermark.image_path.display(), "Watermark asset absent, rendering without it");
        }

        let mut cmd = FfmpegCommand::new(&self.background, &self.output).add_input(&self.audio);
        if with_watermark {
            cmd = cmd.add_input(&self.watermark.image_path);
        }

        cmd.filter_complex(self.filter_graph(with_watermark))
            .map("[v]")
            .map("1:a:0")
            .output_args(self.encoding.to_ffmpeg_args())
            .output_arg("-movflags")
            .output_arg("+faststart")
            .shortest()
    }
}

/// Composite the final video. A failed run leaves no file at `output`.
pub async fn composite(request: &CompositeRequest, runner: &FfmpegRunner) -> MediaResult<()> {
    request.validate()?;

    if let Some(parent) = request.output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = request.build_command();
    info!(
        background = %request.background.display(),
        output = %request.output.display(),
        "Compositing final video"
    );

    if let Err(e) = runner.run(&cmd).await {
        remove_partial(&request.output).await;
        return Err(e);
    }
    Ok(())
}

async fn remove_partial(path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), "Failed to remove partial output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    fn request(dir: &Path) -> CompositeRequest {
        CompositeRequest::new(
            dir.join("bg.mp4"),
            dir.join("voice.wav"),
            dir.join("subtitles.ass"),
            dir.join("out/final.mp4"),
        )
        .with_watermark(WatermarkConfig::default().with_image_path(dir.join("wm.png")))
    }

    #[tokio::test]
    async fn test_missing_inputs_are_named() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        let runner = FfmpegRunner::new();

        let err = composite(&req, &runner).await.unwrap_err();
        assert!(matches!(err, MediaError::MissingInput { input: MediaInput::Background, .. }));

        std::fs::write(&req.background, b"x").unwrap();
        std::fs::write(&req.audio, b"x").unwrap();
        let err = composite(&req, &runner).await.unwrap_err();
        assert!(matches!(err, MediaError::MissingInput { input: MediaInput::Captions, .. }));
        assert!(!req.output.exists());
    }

    #[test]
    fn test_filter_graph_without_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        let graph = req.filter_graph(false);
        assert!(graph.starts_with("[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920"));
        assert!(graph.contains("setsar=1,ass='"));
        assert!(graph.ends_with("[v]"));
        assert!(!graph.contains("overlay"));
    }

    #[test]
    fn test_command_includes_watermark_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        std::fs::write(&req.watermark.image_path, b"png").unwrap();

        let args = req.build_command().build_args();
        let inputs = args.iter().filter(|a| *a == "-i").count();
        assert_eq!(inputs, 3);
        let graph = args.iter().find(|a| a.contains("overlay=5:5")).unwrap();
        assert!(graph.contains("colorchannelmixer=aa=0.15"));
        assert!(args.contains(&"1:a:0".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
    }
}
