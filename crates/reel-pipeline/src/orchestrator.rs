//! Job pipeline orchestrator.
//!
//! Sequences voice synthesis, alignment and compositing for one job, records
//! every stage outcome, and persists `metadata.json` and `log.json` into the
//! job's output directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use reel_media::FfmpegRunner;
use reel_models::{
    FailurePolicy, Job, JobFlags, JobId, JobLog, JobMetadata, OutputKind, StageKind, StepOutcome,
};
use reel_speech::{AlignClient, TtsClient};
use tracing::{warn, Instrument};

use crate::config::PipelineConfig;
use crate::error::{InputKind, PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::retention::prune_oldest;
use crate::script::{compute_stats, derive_title, slugify, truncate_words, word_budget};
use crate::stages::{AlignStage, FfmpegRender, RenderStage, SpeechAligner, SpeechVoice, VoiceStage};
use crate::store::{persist_log, persist_metadata};
use crate::workspace::JobWorkspace;

/// One pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub script_path: PathBuf,
    pub background_path: PathBuf,
    /// Caller-supplied id; generated when absent
    pub job_id: Option<JobId>,
    /// Overrides the derived output directory
    pub output_dir: Option<PathBuf>,
    pub flags: JobFlags,
}

impl PipelineRequest {
    pub fn new(script_path: impl Into<PathBuf>, background_path: impl Into<PathBuf>, flags: JobFlags) -> Self {
        Self {
            script_path: script_path.into(),
            background_path: background_path.into(),
            job_id: None,
            output_dir: None,
            flags,
        }
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// Records stage outcomes and applies the failure policy.
struct StageRunner<'a> {
    job: &'a mut Job,
    log: &'a mut JobLog,
    policy: FailurePolicy,
    logger: &'a JobLogger,
}

impl StageRunner<'_> {
    /// Run one stage. `Ok(true)` on success, `Ok(false)` when the error was
    /// recorded and the job continues, `Err` when the policy aborts.
    async fn run_stage<F>(&mut self, stage: StageKind, fut: F) -> PipelineResult<bool>
    where
        F: Future<Output = PipelineResult<()>>,
    {
        self.logger.log_step(stage, "started");
        let started = Instant::now();
        let result = fut.await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.log.record_step(stage, StepOutcome::Succeeded, elapsed_ms, None);
                self.logger.log_step(stage, &format!("finished in {elapsed_ms}ms"));
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                self.job.record_error(message.clone());
                self.log.append_error(message.clone());
                self.log
                    .record_step(stage, StepOutcome::Failed, elapsed_ms, Some(message.clone()));
                self.logger.log_error(&message);

                if self.policy.aborts() {
                    Err(e)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn skip(&mut self, stage: StageKind, reason: &str) {
        self.log
            .record_step(stage, StepOutcome::Skipped, 0, Some(reason.to_string()));
        self.logger.log_step(stage, &format!("skipped: {reason}"));
    }
}

/// The orchestrator. Cheap to share behind an `Arc`; holds no per-job state.
pub struct Pipeline {
    config: PipelineConfig,
    voice: Arc<dyn VoiceStage>,
    aligner: Arc<dyn AlignStage>,
    renderer: Arc<dyn RenderStage>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        voice: Arc<dyn VoiceStage>,
        aligner: Arc<dyn AlignStage>,
        renderer: Arc<dyn RenderStage>,
    ) -> Self {
        Self {
            config,
            voice,
            aligner,
            renderer,
        }
    }

    /// Production stages configured from the environment.
    pub fn from_config(config: PipelineConfig) -> PipelineResult<Self> {
        let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs);
        let tts = TtsClient::from_env()
            .map_err(|e| PipelineError::VoiceSynthesis(e.to_string()))?
            .with_runner(runner);
        let align = AlignClient::from_env().map_err(|e| PipelineError::Alignment(e.to_string()))?;
        let renderer = FfmpegRender::from_config(&config);

        Ok(Self::new(
            config,
            Arc::new(SpeechVoice::new(tts)),
            Arc::new(SpeechAligner::new(align)),
            Arc::new(renderer),
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a job to completion.
    ///
    /// Stage failures are recorded on the job; only a strict job returns
    /// them as `Err`. Missing inputs fail before anything touches disk.
    pub async fn run(&self, request: PipelineRequest) -> PipelineResult<Job> {
        if !request.script_path.is_file() {
            return Err(PipelineError::input_not_found(InputKind::Script, &request.script_path));
        }
        if !request.background_path.is_file() {
            return Err(PipelineError::input_not_found(
                InputKind::Background,
                &request.background_path,
            ));
        }

        if self.config.cleanup_old > 0 {
            prune_oldest(&self.config.output_root, self.config.cleanup_old).await?;
        }

        let job_id = request.job_id.clone().unwrap_or_default();
        if !job_id.is_path_safe() {
            return Err(PipelineError::workspace(
                job_id.as_str(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "job id is not path safe"),
            ));
        }

        let logger = JobLogger::new(&job_id, "reel").with_verbose(request.flags.verbose);
        let span = logger.create_span();
        self.execute(request, job_id, logger).instrument(span).await
    }

    async fn execute(&self, request: PipelineRequest, job_id: JobId, logger: JobLogger) -> PipelineResult<Job> {
        let mut script = tokio::fs::read_to_string(&request.script_path).await?;
        if let Some(max_length) = request.flags.max_length {
            let budget = word_budget(max_length);
            if let Some(truncated) = truncate_words(&script, budget) {
                logger.log_warning(&format!(
                    "Script truncated to {budget} words for a {max_length}s target"
                ));
                script = truncated;
            }
        }

        let title = derive_title(&script);
        let slug = slugify(&title);
        let workspace = JobWorkspace::resolve(
            &self.config,
            &job_id,
            request.job_id.is_some(),
            request.output_dir.as_deref(),
            &slug,
        );
        workspace.create().await?;

        let mut job = Job::new(job_id, request.flags.clone());
        job.title = title;
        job.stats = compute_stats(&script);
        job.start();
        let mut log = JobLog::init(job.job_id.clone(), request.flags.test_mode);

        logger.log_start(&format!(
            "\"{}\" ({} words, test_mode={}, output={})",
            job.title,
            job.stats.word_count,
            request.flags.test_mode,
            workspace.output_dir.display()
        ));

        let staged = self
            .run_stages(&mut job, &mut log, &workspace, &script, &request, &logger)
            .await;

        let audio_duration = match staged {
            Ok(duration) => duration,
            Err(e) => {
                job.fail(e.to_string());
                if let Err(persist_err) = persist_log(&log, &workspace.output_dir).await {
                    warn!("Failed to write job log after abort: {}", persist_err);
                }
                if !request.flags.keep_temp {
                    workspace.cleanup_temp().await;
                }
                logger.log_error(&format!("aborted: {e}"));
                return Err(e);
            }
        };

        if !request.flags.keep_temp {
            job.output_files.retain(|kind, _| !kind.is_intermediate());
        }
        job.set_output(OutputKind::Log, workspace.path(OutputKind::Log));
        job.set_output(OutputKind::Metadata, workspace.path(OutputKind::Metadata));
        job.complete();

        let script_name = request
            .script_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = JobMetadata::from_job(&job, script_name, self.voice.voice_id(), audio_duration);

        let persisted = async {
            persist_metadata(&metadata, &workspace.output_dir).await?;
            persist_log(&log, &workspace.output_dir).await?;
            Ok::<_, PipelineError>(())
        }
        .await;

        if !request.flags.keep_temp {
            workspace.cleanup_temp().await;
        }
        persisted?;

        logger.log_completion(&format!(
            "status={} errors={} runtime={}",
            job.status,
            job.errors.len(),
            metadata.total_runtime
        ));
        Ok(job)
    }

    /// Stages in fixed order. Returns the voiceover duration when readable.
    async fn run_stages(
        &self,
        job: &mut Job,
        log: &mut JobLog,
        workspace: &JobWorkspace,
        script: &str,
        request: &PipelineRequest,
        logger: &JobLogger,
    ) -> PipelineResult<Option<f64>> {
        let flags = &request.flags;
        let audio = workspace.path(OutputKind::Audio);
        let captions = workspace.path(OutputKind::Subtitles);
        let mut runner = StageRunner {
            job,
            log,
            policy: flags.failure_policy(),
            logger,
        };

        if runner
            .run_stage(
                StageKind::Synthesis,
                self.voice.synthesize(script, &audio, flags.test_mode),
            )
            .await?
        {
            runner.job.set_output(OutputKind::Audio, &audio);
        }

        // Runs even when synthesis failed; a missing voiceover surfaces here
        if runner
            .run_stage(
                StageKind::Alignment,
                self.aligner
                    .align(&audio, &captions, flags.test_mode, &flags.model_size),
            )
            .await?
        {
            runner.job.set_output(OutputKind::Subtitles, &captions);
        }

        if flags.dry_run {
            runner.skip(StageKind::Composite, "dry run");
        } else {
            let video = workspace.path(OutputKind::Video);
            if runner
                .run_stage(
                    StageKind::Composite,
                    self.renderer
                        .composite(&request.background_path, &audio, &captions, &video),
                )
                .await?
            {
                runner.job.set_output(OutputKind::Video, &video);
            }

            if flags.thumbnail {
                if runner.job.errors.is_empty() {
                    let thumb = workspace.path(OutputKind::Thumbnail);
                    let title = runner.job.title.clone();
                    if runner
                        .run_stage(
                            StageKind::Thumbnail,
                            self.renderer.thumbnail(&video, &thumb, &title),
                        )
                        .await?
                    {
                        runner.job.set_output(OutputKind::Thumbnail, &thumb);
                    }
                } else {
                    runner.skip(StageKind::Thumbnail, "earlier stage failed");
                }
            }

            if flags.compress {
                if runner.job.errors.is_empty() {
                    let compressed = workspace.path(OutputKind::Compressed);
                    if runner
                        .run_stage(
                            StageKind::Compress,
                            self.renderer.compress(&video, &compressed),
                        )
                        .await?
                    {
                        runner.job.set_output(OutputKind::Compressed, &compressed);
                    }
                } else {
                    runner.skip(StageKind::Compress, "earlier stage failed");
                }
            }
        }

        Ok(read_audio_duration(&audio, logger))
    }
}

fn read_audio_duration(audio: &Path, logger: &JobLogger) -> Option<f64> {
    if !audio.is_file() {
        return None;
    }
    match reel_media::wav_duration(audio) {
        Ok(duration) => Some(duration),
        Err(e) => {
            logger.log_warning(&format!("Could not read voiceover duration: {e}"));
            None
        }
    }
}
