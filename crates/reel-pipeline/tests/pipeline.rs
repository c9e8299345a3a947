//! End-to-end orchestrator runs with placeholder speech and a fake renderer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reel_models::{JobFlags, JobId, JobStatus, OutputKind, StageKind, StepOutcome};
use reel_pipeline::{
    load_log, AlignStage, InputKind, Pipeline, PipelineConfig, PipelineError, PipelineRequest, PipelineResult,
    RenderStage, SpeechAligner, SpeechVoice, VoiceStage,
};
use reel_speech::{AlignClient, AlignConfig, TtsClient, TtsConfig};
use tempfile::TempDir;

#[derive(Default)]
struct FakeRender {
    fail_composite: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeRender {
    fn failing() -> Self {
        Self {
            fail_composite: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderStage for FakeRender {
    async fn composite(&self, background: &Path, audio: &Path, captions: &Path, output: &Path) -> PipelineResult<()> {
        self.calls.lock().unwrap().push("composite");
        if self.fail_composite {
            return Err(PipelineError::Composite("ffmpeg exited with status 1".to_string()));
        }
        assert!(background.is_file() && audio.is_file() && captions.is_file());
        std::fs::write(output, b"fake mp4")?;
        Ok(())
    }

    async fn thumbnail(&self, _video: &Path, output: &Path, _title: &str) -> PipelineResult<()> {
        self.calls.lock().unwrap().push("thumbnail");
        std::fs::write(output, b"png")?;
        Ok(())
    }

    async fn compress(&self, _video: &Path, output: &Path) -> PipelineResult<()> {
        self.calls.lock().unwrap().push("compress");
        std::fs::write(output, b"small mp4")?;
        Ok(())
    }
}

struct FailingVoice;

#[async_trait]
impl VoiceStage for FailingVoice {
    async fn synthesize(&self, _text: &str, _out: &Path, _test_mode: bool) -> PipelineResult<()> {
        Err(PipelineError::VoiceSynthesis("backend unavailable".to_string()))
    }

    fn voice_id(&self) -> &str {
        "none"
    }
}

struct Fixture {
    dir: TempDir,
    script: PathBuf,
    background: PathBuf,
}

impl Fixture {
    fn new(script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("script.txt");
        let background = dir.path().join("bg.mp4");
        std::fs::write(&script_path, script).unwrap();
        std::fs::write(&background, b"background").unwrap();
        Self {
            dir,
            script: script_path,
            background,
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::rooted_at(self.dir.path())
    }

    fn output_root(&self) -> PathBuf {
        self.config().output_root
    }

    fn pipeline(&self, renderer: Arc<FakeRender>) -> Pipeline {
        self.pipeline_with_voice(Arc::new(placeholder_voice()), renderer)
    }

    fn pipeline_with_voice(&self, voice: Arc<dyn VoiceStage>, renderer: Arc<FakeRender>) -> Pipeline {
        let aligner: Arc<dyn AlignStage> =
            Arc::new(SpeechAligner::new(AlignClient::new(AlignConfig::default()).unwrap()));
        Pipeline::new(self.config(), voice, aligner, renderer)
    }

    fn request(&self, flags: JobFlags) -> PipelineRequest {
        PipelineRequest::new(&self.script, &self.background, flags)
    }
}

fn placeholder_voice() -> SpeechVoice {
    SpeechVoice::new(TtsClient::new(TtsConfig::default()).unwrap())
}

#[tokio::test]
async fn test_mode_run_produces_final_video() {
    let fx = Fixture::new("Hello World\nThis is the body of the script.");
    let renderer = Arc::new(FakeRender::default());
    let job = fx.pipeline(renderer.clone()).run(fx.request(JobFlags::test())).await.unwrap();

    let out = fx.output_root().join("hello_world");
    assert_eq!(job.status, JobStatus::Complete);
    assert!(job.errors.is_empty());
    assert_eq!(job.title, "Hello World");
    assert!(out.join("final.mp4").is_file());
    assert!(out.join("metadata.json").is_file());
    assert!(out.join("log.json").is_file());
    assert_eq!(job.output(OutputKind::Video), Some(&out.join("final.mp4")));

    // Temp cleaned, intermediates no longer listed
    assert!(!fx.config().temp_root.join(job.job_id.as_str()).exists());
    assert!(job.output(OutputKind::Audio).is_none());

    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("metadata.json")).unwrap()).unwrap();
    assert_eq!(meta["title"], "Hello World");
    assert_eq!(meta["script"], "script.txt");
    assert_eq!(meta["word_count"], 9);
    assert_eq!(meta["audio_duration"], 2.0);
    assert_eq!(meta["status"], "complete");
    assert_eq!(renderer.calls(), vec!["composite"]);
}

#[tokio::test]
async fn missing_script_fails_before_creating_directories() {
    let fx = Fixture::new("hello");
    std::fs::remove_file(&fx.script).unwrap();

    let err = fx
        .pipeline(Arc::new(FakeRender::default()))
        .run(fx.request(JobFlags::test()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InputNotFound { input: InputKind::Script, .. }));
    assert!(!fx.output_root().exists());
    assert!(!fx.config().temp_root.exists());
}

#[tokio::test]
async fn missing_background_is_reported() {
    let fx = Fixture::new("hello");
    std::fs::remove_file(&fx.background).unwrap();

    let err = fx
        .pipeline(Arc::new(FakeRender::default()))
        .run(fx.request(JobFlags::test()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InputNotFound { input: InputKind::Background, .. }));
    assert!(!fx.output_root().exists());
}

#[tokio::test]
async fn strict_compositor_failure_aborts_without_video() {
    let fx = Fixture::new("Strict Job\nbody");
    let flags = JobFlags {
        strict: true,
        ..JobFlags::test()
    };

    let err = fx
        .pipeline(Arc::new(FakeRender::failing()))
        .run(fx.request(flags))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Composite(_)));

    let out = fx.output_root().join("strict_job");
    assert!(!out.join("final.mp4").exists());
    assert!(!out.join("metadata.json").exists());

    let log = load_log(&out).await.unwrap();
    assert_eq!(log.errors.len(), 1);
    assert!(log
        .steps
        .iter()
        .any(|s| s.stage == StageKind::Composite && s.outcome == StepOutcome::Failed));
}

#[tokio::test]
async fn best_effort_compositor_failure_still_completes() {
    let fx = Fixture::new("Soft Job\nbody");
    let flags = JobFlags {
        thumbnail: true,
        compress: true,
        ..JobFlags::test()
    };
    let renderer = Arc::new(FakeRender::failing());

    let job = fx.pipeline(renderer.clone()).run(fx.request(flags)).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.errors.len(), 1);
    assert!(job.errors[0].contains("Compositing failed"));

    let out = fx.output_root().join("soft_job");
    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("metadata.json")).unwrap()).unwrap();
    assert_eq!(meta["errors"].as_array().unwrap().len(), 1);

    // Post-stages never run after an error
    assert_eq!(renderer.calls(), vec!["composite"]);
    let log = load_log(&out).await.unwrap();
    assert!(log
        .steps
        .iter()
        .any(|s| s.stage == StageKind::Thumbnail && s.outcome == StepOutcome::Skipped));
}

#[tokio::test]
async fn alignment_runs_after_synthesis_failure() {
    let fx = Fixture::new("Voice Down\nbody");
    let renderer = Arc::new(FakeRender::default());
    let job = fx
        .pipeline_with_voice(Arc::new(FailingVoice), renderer.clone())
        .run(fx.request(JobFlags {
            dry_run: true,
            ..JobFlags::test()
        }))
        .await
        .unwrap();

    assert_eq!(job.errors.len(), 1);
    assert!(job.errors[0].contains("Voice synthesis failed"));

    let log = load_log(&fx.output_root().join("voice_down")).await.unwrap();
    let alignment = log.steps.iter().find(|s| s.stage == StageKind::Alignment).unwrap();
    assert_eq!(alignment.outcome, StepOutcome::Succeeded);
}

#[tokio::test]
async fn dry_run_skips_compositing() {
    let fx = Fixture::new("Dry\nbody");
    let renderer = Arc::new(FakeRender::default());
    let flags = JobFlags {
        dry_run: true,
        keep_temp: true,
        ..JobFlags::test()
    };

    let job = fx.pipeline(renderer.clone()).run(fx.request(flags)).await.unwrap();
    assert!(renderer.calls().is_empty());
    assert!(!fx.output_root().join("dry/final.mp4").exists());

    // keep_temp leaves the intermediates in place and listed
    let audio = job.output(OutputKind::Audio).unwrap();
    assert!(audio.is_file());
    assert!(job.output(OutputKind::Subtitles).unwrap().is_file());
}

#[tokio::test]
async fn post_stages_run_on_clean_job() {
    let fx = Fixture::new("Extras\nbody");
    let renderer = Arc::new(FakeRender::default());
    let flags = JobFlags {
        thumbnail: true,
        compress: true,
        ..JobFlags::test()
    };

    let job = fx.pipeline(renderer.clone()).run(fx.request(flags)).await.unwrap();
    assert_eq!(renderer.calls(), vec!["composite", "thumbnail", "compress"]);
    let out = fx.output_root().join("extras");
    assert!(out.join("thumbnail.png").is_file());
    assert!(out.join("final_compressed.mp4").is_file());
    assert!(job.output(OutputKind::Compressed).is_some());
}

#[tokio::test]
async fn supplied_job_id_names_output_dir() {
    let fx = Fixture::new("Named\nbody");
    let request = fx
        .request(JobFlags::test())
        .with_job_id(JobId::from_string("abc123"));

    let job = fx
        .pipeline(Arc::new(FakeRender::default()))
        .run(request)
        .await
        .unwrap();
    assert_eq!(job.job_id.as_str(), "abc123");
    assert!(fx.output_root().join("abc123/final.mp4").is_file());
}

#[tokio::test]
async fn unsafe_job_id_is_rejected() {
    let fx = Fixture::new("Named\nbody");
    let request = fx
        .request(JobFlags::test())
        .with_job_id(JobId::from_string("../escape"));

    let err = fx
        .pipeline(Arc::new(FakeRender::default()))
        .run(request)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Workspace { .. }));
}

#[tokio::test]
async fn max_length_truncates_script() {
    let words: Vec<String> = (0..50).map(|i| format!("word{i}")).collect();
    let fx = Fixture::new(&words.join(" "));
    let flags = JobFlags {
        max_length: Some(2),
        dry_run: true,
        ..JobFlags::test()
    };

    let job = fx
        .pipeline(Arc::new(FakeRender::default()))
        .run(fx.request(flags))
        .await
        .unwrap();
    assert_eq!(job.stats.word_count, 6);
}

#[tokio::test]
async fn cleanup_old_prunes_before_running() {
    let fx = Fixture::new("Fresh\nbody");
    let stale = fx.output_root().join("stale");
    std::fs::create_dir_all(&stale).unwrap();

    let mut config = fx.config();
    config.cleanup_old = 1;
    let aligner: Arc<dyn AlignStage> =
        Arc::new(SpeechAligner::new(AlignClient::new(AlignConfig::default()).unwrap()));
    let pipeline = Pipeline::new(
        config,
        Arc::new(placeholder_voice()),
        aligner,
        Arc::new(FakeRender::default()),
    );

    pipeline.run(fx.request(JobFlags::test())).await.unwrap();
    assert!(!stale.exists());
    assert!(fx.output_root().join("fresh/final.mp4").is_file());
}

/// Same run through the real ffmpeg compositor, when ffmpeg with libass is present.
#[tokio::test]
async fn test_mode_run_with_ffmpeg() {
    if reel_media::check_ffmpeg().is_err() {
        return;
    }
    let filters = std::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-filters"])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
        .unwrap_or_default();
    if !filters.lines().any(|l| l.split_whitespace().nth(1) == Some("ass")) {
        return;
    }

    let fx = Fixture::new("Real Render\nbody");
    let status = std::process::Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i", "color=c=blue:s=320x240:d=3"])
        .arg(&fx.background)
        .status()
        .unwrap();
    assert!(status.success());

    let config = fx.config();
    let renderer: Arc<dyn RenderStage> = Arc::new(reel_pipeline::FfmpegRender::new(
        reel_media::FfmpegRunner::new().with_timeout(120),
        reel_media::WatermarkConfig::default().with_image_path(fx.dir.path().join("no-watermark.png")),
    ));
    let aligner: Arc<dyn AlignStage> =
        Arc::new(SpeechAligner::new(AlignClient::new(AlignConfig::default()).unwrap()));
    let pipeline = Pipeline::new(config, Arc::new(placeholder_voice()), aligner, renderer);

    let job = pipeline.run(fx.request(JobFlags::test())).await.unwrap();
    assert!(job.errors.is_empty(), "errors: {:?}", job.errors);
    let video = fx.output_root().join("real_render/final.mp4");
    assert!(std::fs::metadata(video).unwrap().len() > 0);
}
