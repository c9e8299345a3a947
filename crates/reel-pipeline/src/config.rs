//! Pipeline configuration.

use std::path::{Path, PathBuf};

use reel_media::DEFAULT_FFMPEG_TIMEOUT_SECS;
use tracing::{debug, warn};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which each job's output directory is created
    pub output_root: PathBuf,
    /// Root for per-job intermediates
    pub temp_root: PathBuf,
    /// Prune this many of the oldest output directories before a run (0 = off)
    pub cleanup_old: usize,
    /// Upper bound on each ffmpeg invocation
    pub ffmpeg_timeout_secs: u64,
    /// Watermark asset; `None` uses the built-in lookup
    pub watermark_path: Option<PathBuf>,
    /// Persisted settings consulted for the test-mode default
    pub state_file: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output"),
            temp_root: PathBuf::from("temp"),
            cleanup_old: 0,
            ffmpeg_timeout_secs: DEFAULT_FFMPEG_TIMEOUT_SECS,
            watermark_path: None,
            state_file: PathBuf::from("state.json"),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            output_root: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            temp_root: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("temp")),
            cleanup_old: std::env::var("CLEANUP_OLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            ffmpeg_timeout_secs: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FFMPEG_TIMEOUT_SECS),
            watermark_path: std::env::var("WATERMARK_PATH").ok().map(PathBuf::from),
            state_file: std::env::var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("state.json")),
        }
    }

    /// Config rooted in `dir`, used by tests and the API's scratch space.
    pub fn rooted_at(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            output_root: dir.join("output"),
            temp_root: dir.join("temp"),
            state_file: dir.join("state.json"),
            ..Self::default()
        }
    }

    /// Resolve test mode: explicit, then `TEST_MODE`, then the state file, then on.
    pub fn resolve_test_mode(&self, explicit: Option<bool>) -> bool {
        resolve_test_mode_from(
            explicit,
            std::env::var("TEST_MODE").ok().as_deref(),
            &self.state_file,
        )
    }
}

/// Parse a human boolean such as `1`, `true`, `yes` or `off`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn resolve_test_mode_from(explicit: Option<bool>, env: Option<&str>, state_file: &Path) -> bool {
    if let Some(value) = explicit {
        return value;
    }

    if let Some(raw) = env {
        match parse_flag(raw) {
            Some(value) => return value,
            None => warn!(value = raw, "Ignoring unrecognised TEST_MODE value"),
        }
    }

    if let Some(value) = read_state_flag(state_file) {
        debug!(path = %state_file.display(), test_mode = value, "Test mode from state file");
        return value;
    }

    true
}

fn read_state_flag(path: &Path) -> Option<bool> {
    let raw = std::fs::read_to_string(path).ok()?;
    let state: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), "Unreadable state file: {}", e);
            return None;
        }
    };
    match state.get("test_mode")? {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => parse_flag(s),
        serde_json::Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}
