//! `reel` command-line interface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{JobFlags, JobId, OutputKind, DEFAULT_MODEL_SIZE};
use reel_pipeline::{Pipeline, PipelineConfig, PipelineRequest};
use reel_speech::{AlignConfig, TtsConfig};

#[derive(Parser, Debug)]
#[command(name = "reel")]
#[command(about = "Turn a text script into a captioned vertical video", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline for one script
    Run(RunArgs),
    /// Create the output, temp, logs and assets directories
    Init,
    /// Check ffmpeg and backend configuration
    Check,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Script text file
    script: PathBuf,
    /// Background video
    background: PathBuf,
    /// Write outputs here instead of the derived directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    job_id: Option<String>,
    /// Produce audio and captions only
    #[arg(long)]
    dry_run: bool,
    /// Use placeholder backends
    #[arg(long, conflicts_with = "live")]
    test_mode: bool,
    /// Call the real speech backends
    #[arg(long)]
    live: bool,
    #[arg(short, long)]
    verbose: bool,
    /// Abort on the first stage failure
    #[arg(long)]
    strict: bool,
    /// Keep intermediates in the temp directory
    #[arg(long)]
    keep_temp: bool,
    #[arg(long)]
    thumbnail: bool,
    #[arg(long)]
    compress: bool,
    /// Transcription model size for alignment
    #[arg(long, default_value = DEFAULT_MODEL_SIZE)]
    model_size: String,
    /// Target spoken length in seconds; the script is cut to fit
    #[arg(long)]
    max_length: Option<u32>,
    /// Prune the N oldest output directories first
    #[arg(long)]
    cleanup_old: Option<usize>,
    /// Print a JSON summary to stdout
    #[arg(long)]
    json: bool,
}

fn init_tracing(verbose: bool) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let directive = if verbose { "reel=debug" } else { "reel=info" };
    let env_filter = EnvFilter::from_default_env().add_directive(directive.parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let verbose = matches!(&cli.command, Commands::Run(args) if args.verbose);
    init_tracing(verbose);

    let result = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Init => init().await,
        Commands::Check => check().await,
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = PipelineConfig::from_env();
    if let Some(n) = args.cleanup_old {
        config.cleanup_old = n;
    }

    let explicit_test_mode = match (args.test_mode, args.live) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let flags = JobFlags {
        dry_run: args.dry_run,
        test_mode: config.resolve_test_mode(explicit_test_mode),
        verbose: args.verbose,
        strict: args.strict,
        keep_temp: args.keep_temp,
        thumbnail: args.thumbnail,
        compress: args.compress,
        model_size: args.model_size,
        max_length: args.max_length,
    };

    let mut request = PipelineRequest::new(args.script, args.background, flags);
    if let Some(id) = args.job_id {
        request = request.with_job_id(JobId::from_string(id));
    }
    if let Some(dir) = args.output_dir {
        request = request.with_output_dir(dir);
    }

    let pipeline = Pipeline::from_config(config).context("failed to configure pipeline")?;
    let job = pipeline.run(request).await?;

    let output_path = job
        .output(OutputKind::Metadata)
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf());

    if args.json {
        let summary = json!({
            "job_id": job.job_id,
            "status": job.status,
            "output_path": output_path,
            "video": job.output(OutputKind::Video),
            "errors": job.errors,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!(
            job_id = %job.job_id,
            status = %job.status,
            errors = job.errors.len(),
            "Done"
        );
        if let Some(path) = output_path {
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn init() -> Result<()> {
    let config = PipelineConfig::from_env();
    for dir in [
        config.output_root.clone(),
        config.temp_root.clone(),
        PathBuf::from("logs"),
        PathBuf::from("assets"),
    ] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        println!("created {}", dir.display());
    }
    Ok(())
}

async fn check() -> Result<()> {
    let config = PipelineConfig::from_env();

    let ffmpeg = reel_media::check_ffmpeg();
    match &ffmpeg {
        Ok(path) => println!("ffmpeg: {}", path.display()),
        Err(e) => println!("ffmpeg: {e}"),
    }

    let tts = TtsConfig::from_env();
    println!(
        "tts credential ({}): {}",
        reel_speech::API_KEY_ENV,
        if tts.has_credential() { "configured" } else { "missing" }
    );
    println!("tts voice: {}", tts.voice_id);

    let align = AlignConfig::from_env();
    println!("alignment service: {}", align.base_url);
    println!("test mode default: {}", config.resolve_test_mode(None));

    ffmpeg.map(|_| ()).context("ffmpeg is required")
}
