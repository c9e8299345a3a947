//! Job submission, status and result handlers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{ConnectInfo, Multipart, Path as UrlPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use reel_models::{Job, JobFlags, JobId, JobLog, JobStatus, OutputKind};
use reel_pipeline::{load_log, parse_flag, PipelineConfig, PipelineRequest};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::middleware::submitter_key;
use crate::registry::JobEntry;
use crate::state::AppState;

const SCRIPT_FILE: &str = "script.txt";

/// Per-job options accepted at submission.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct GenerateOptions {
    #[serde(default)]
    pub dry_run: bool,
    /// Unset falls back to the server's test-mode default
    #[serde(default)]
    pub test_mode: Option<bool>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub keep_temp: bool,
    #[serde(default)]
    pub thumbnail: bool,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    #[validate(length(min = 1, max = 32))]
    pub model_size: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 3600))]
    pub max_length: Option<u32>,
}

impl GenerateOptions {
    /// Resolve into the flags the pipeline runs with.
    pub fn into_flags(self, config: &PipelineConfig) -> JobFlags {
        let defaults = JobFlags::default();
        JobFlags {
            dry_run: self.dry_run,
            test_mode: config.resolve_test_mode(self.test_mode),
            verbose: self.verbose,
            strict: self.strict,
            keep_temp: self.keep_temp,
            thumbnail: self.thumbnail,
            compress: self.compress,
            model_size: self.model_size.unwrap_or(defaults.model_size),
            max_length: self.max_length,
        }
    }

    /// Apply one multipart text field. False when the name is not an option.
    fn set_field(&mut self, name: &str, value: &str) -> ApiResult<bool> {
        let truthy = || parse_flag(value).unwrap_or(false);
        match name {
            "dry_run" => self.dry_run = truthy(),
            "test_mode" => self.test_mode = parse_flag(value),
            "verbose" => self.verbose = truthy(),
            "strict" => self.strict = truthy(),
            "keep_temp" => self.keep_temp = truthy(),
            "thumbnail" => self.thumbnail = truthy(),
            "compress" => self.compress = truthy(),
            "model_size" => self.model_size = Some(value.trim().to_string()),
            "max_length" => {
                let secs = value
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::bad_request("max_length must be a positive integer"))?;
                self.max_length = Some(secs);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// JSON submission body.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    /// Script text
    #[validate(length(min = 1, max = 100000))]
    pub script: String,
    /// Background video path on the server
    #[validate(length(min = 1))]
    pub background: String,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub options: GenerateOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub title: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_url: Option<String>,
}

fn resolve_job_id(supplied: Option<String>) -> ApiResult<JobId> {
    let job_id = match supplied.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(id) => JobId::from_string(id),
        None => JobId::new(),
    };
    if !job_id.is_path_safe() {
        return Err(ApiError::bad_request("job_id may only contain letters, digits, '-' and '_'"));
    }
    Ok(job_id)
}

async fn remove_staging(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %dir.display(), "Failed to remove staging dir: {}", e);
        }
    }
}

/// Admit a job before anything is written for it, so the retention sweep
/// sees its directories as protected from the first byte on.
async fn register(state: &AppState, submitter: &str, job_id: &JobId, flags: &JobFlags, source: &str) -> ApiResult<()> {
    let entry = JobEntry::new(
        Job::new(job_id.clone(), flags.clone()),
        state.output_dir_for(job_id.as_str()),
        state.staging_dir_for(job_id.as_str()),
    );

    match state.registry.try_submit(submitter, entry).await {
        Ok(_) => Ok(()),
        Err(e) => {
            if matches!(e, ApiError::RateLimited { .. }) {
                metrics::record_rate_limit_hit(source);
            }
            Err(e)
        }
    }
}

/// Hand a registered job to the worker pool once its inputs are staged.
///
/// A staging failure fails the registered job and removes what was written.
async fn dispatch(
    state: &AppState,
    submitter: &str,
    job_id: JobId,
    staged: ApiResult<PathBuf>,
    flags: JobFlags,
    source: &str,
) -> ApiResult<Response> {
    let staging_dir = state.staging_dir_for(job_id.as_str());
    let background = match staged {
        Ok(background) => background,
        Err(e) => {
            state.registry.fail(&job_id, format!("staging failed: {e}")).await;
            remove_staging(&staging_dir).await;
            return Err(e);
        }
    };

    let request = PipelineRequest::new(staging_dir.join(SCRIPT_FILE), background, flags)
        .with_job_id(job_id.clone())
        .with_output_dir(state.output_dir_for(job_id.as_str()));
    state.workers.dispatch(job_id.clone(), request);
    metrics::record_job_submitted(source);
    info!(job_id = %job_id, submitter = %submitter, source = source, "Job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    )
        .into_response())
}

/// POST /api/generate
pub async fn generate(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> ApiResult<Response> {
    body.validate()?;
    let submitter = submitter_key(&headers, connect_info.as_ref(), state.config.trust_proxy_headers);
    let job_id = resolve_job_id(body.job_id)?;

    let background = PathBuf::from(&body.background);
    if !background.is_file() {
        return Err(ApiError::bad_request(format!(
            "background video not found: {}",
            background.display()
        )));
    }

    let flags = body.options.into_flags(state.pipeline_config());
    register(&state, &submitter, &job_id, &flags, "json").await?;

    let staging_dir = state.staging_dir_for(job_id.as_str());
    let staged: ApiResult<PathBuf> = async {
        tokio::fs::create_dir_all(&staging_dir).await?;
        tokio::fs::write(staging_dir.join(SCRIPT_FILE), body.script.as_bytes()).await?;
        Ok(background)
    }
    .await;

    dispatch(&state, &submitter, job_id, staged, flags, "json").await
}

/// Upload fields collected from a multipart submission.
#[derive(Default)]
struct UploadForm {
    job_id: Option<String>,
    script: Option<PathBuf>,
    background_file: Option<PathBuf>,
    background_path: Option<PathBuf>,
    options: GenerateOptions,
}

/// Extension for the stored background, taken from the client file name.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "mp4".to_string())
}

async fn read_upload_form(multipart: &mut Multipart, dir: &Path) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "script_file" | "background_file" => {
                let path = if name == "script_file" {
                    dir.join(SCRIPT_FILE)
                } else {
                    dir.join(format!("background.{}", upload_extension(field.file_name())))
                };
                let mut file = tokio::fs::File::create(&path).await?;
                while let Some(chunk) = field.chunk().await? {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;

                if name == "script_file" {
                    form.script = Some(path);
                } else {
                    form.background_file = Some(path);
                }
            }
            "background" => form.background_path = Some(PathBuf::from(field.text().await?.trim())),
            "job_id" => form.job_id = Some(field.text().await?),
            other => {
                let value = field.text().await?;
                if !form.options.set_field(other, &value)? {
                    warn!(field = other, "Ignoring unknown upload field");
                }
            }
        }
    }
    Ok(form)
}

/// POST /api/generate/upload
pub async fn generate_upload(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let submitter = submitter_key(&headers, connect_info.as_ref(), state.config.trust_proxy_headers);

    // Fields arrive in any order; stage under a scratch name until the job id is known
    let scratch = state.config.jobs_dir.join(format!(".upload-{}", Uuid::new_v4().simple()));
    tokio::fs::create_dir_all(&scratch).await?;

    let form = match read_upload_form(&mut multipart, &scratch).await {
        Ok(form) => form,
        Err(e) => {
            remove_staging(&scratch).await;
            return Err(e);
        }
    };

    let UploadForm {
        job_id,
        script,
        background_file,
        background_path,
        options,
    } = form;

    let prepared: ApiResult<(JobId, PathBuf)> = async {
        options.validate()?;
        if script.is_none() {
            return Err(ApiError::bad_request("script_file is required"));
        }
        let job_id = resolve_job_id(job_id)?;

        let background = match (background_file, background_path) {
            (Some(uploaded), _) => state
                .staging_dir_for(job_id.as_str())
                .join(uploaded.file_name().unwrap_or_default()),
            (None, Some(path)) if path.is_file() => path,
            (None, Some(path)) => {
                return Err(ApiError::bad_request(format!(
                    "background video not found: {}",
                    path.display()
                )))
            }
            (None, None) => return Err(ApiError::bad_request("background_file or background is required")),
        };
        Ok((job_id, background))
    }
    .await;

    let flags = options.into_flags(state.pipeline_config());
    let registered = match prepared {
        Ok((job_id, background)) => register(&state, &submitter, &job_id, &flags, "upload")
            .await
            .map(|()| (job_id, background)),
        Err(e) => Err(e),
    };
    let (job_id, background) = match registered {
        Ok(registered) => registered,
        Err(e) => {
            remove_staging(&scratch).await;
            return Err(e);
        }
    };

    let staged: ApiResult<PathBuf> = match tokio::fs::rename(&scratch, state.staging_dir_for(job_id.as_str())).await {
        Ok(()) => Ok(background),
        Err(e) => {
            remove_staging(&scratch).await;
            Err(e.into())
        }
    };
    dispatch(&state, &submitter, job_id, staged, flags, "upload").await
}

async fn lookup(state: &AppState, job_id: &str) -> ApiResult<JobEntry> {
    state
        .registry
        .get(&JobId::from_string(job_id))
        .await
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))
}

/// GET /api/status/:job_id
pub async fn job_status(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Json<StatusResponse>> {
    let entry = lookup(&state, &job_id).await?;
    let job = &entry.job;

    let video_ready = job.status == JobStatus::Complete
        && job.output(OutputKind::Video).map(|p| p.is_file()).unwrap_or(false);
    let log_present = entry.output_dir.join(OutputKind::Log.file_name()).is_file();

    Ok(Json(StatusResponse {
        job_id: job.job_id.clone(),
        status: job.status,
        title: job.title.clone(),
        started_at: job.started_at,
        completed_at: job.completed_at,
        duration_seconds: job.duration_seconds,
        errors: job.errors.clone(),
        video_url: video_ready.then(|| format!("/api/download/{}", job.job_id)),
        log_url: log_present.then(|| format!("/api/logs/{}", job.job_id)),
    }))
}

/// GET /api/download/:job_id
pub async fn download(State(state): State<AppState>, UrlPath(job_id): UrlPath<String>) -> ApiResult<Response> {
    let entry = lookup(&state, &job_id).await?;
    if entry.status() != JobStatus::Complete {
        return Err(ApiError::not_found(format!("result for job {job_id} is not available")));
    }
    let video = entry
        .job
        .output(OutputKind::Video)
        .filter(|p| p.is_file())
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} has no video")))?;

    let bytes = tokio::fs::read(video).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.mp4\"", entry.job_id()),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// GET /api/logs/:job_id
pub async fn job_log(State(state): State<AppState>, UrlPath(job_id): UrlPath<String>) -> ApiResult<Json<JobLog>> {
    let entry = lookup(&state, &job_id).await?;
    match load_log(&entry.output_dir).await {
        Ok(log) => Ok(Json(log)),
        Err(e) => {
            warn!(job_id = %job_id, "Job log unavailable: {}", e);
            Err(ApiError::not_found(format!("log for job {job_id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_resolve_flags() {
        let config = PipelineConfig::default();
        let options: GenerateOptions =
            serde_json::from_str(r#"{"strict": true, "test_mode": true, "max_length": 30}"#).unwrap();
        let flags = options.into_flags(&config);
        assert!(flags.strict && flags.test_mode);
        assert_eq!(flags.max_length, Some(30));
        assert_eq!(flags.model_size, reel_models::DEFAULT_MODEL_SIZE);
    }

    #[test]
    fn test_options_validation() {
        let options = GenerateOptions {
            max_length: Some(0),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = GenerateOptions {
            model_size: Some(String::new()),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_multipart_truthy_fields() {
        let mut options = GenerateOptions::default();
        assert!(options.set_field("thumbnail", "yes").unwrap());
        assert!(options.set_field("compress", "1").unwrap());
        assert!(options.set_field("strict", "nope").unwrap());
        assert!(!options.set_field("color", "red").unwrap());
        assert!(options.thumbnail && options.compress && !options.strict);
        assert!(options.set_field("max_length", "abc").is_err());
    }

    #[test]
    fn test_upload_extension() {
        assert_eq!(upload_extension(Some("clip.MOV")), "mov");
        assert_eq!(upload_extension(Some("noext")), "mp4");
        assert_eq!(upload_extension(Some("../evil.m p4")), "mp4");
        assert_eq!(upload_extension(None), "mp4");
    }

    #[test]
    fn test_resolve_job_id() {
        assert_eq!(resolve_job_id(Some("abc_1".into())).unwrap().as_str(), "abc_1");
        assert!(resolve_job_id(Some("../x".into())).is_err());
        assert!(!resolve_job_id(None).unwrap().as_str().is_empty());
    }
}
