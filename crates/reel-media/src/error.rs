//! Error types for media operations.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Named input of a media operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaInput {
    Background,
    Audio,
    Captions,
    Video,
}

impl fmt::Display for MediaInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaInput::Background => "background video",
            MediaInput::Audio => "audio",
            MediaInput::Captions => "caption track",
            MediaInput::Video => "video",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Missing {input} input: {}", path.display())]
    MissingInput { input: MediaInput, path: PathBuf },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid audio file: {0}")]
    InvalidAudio(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn missing_input(input: MediaInput, path: impl AsRef<Path>) -> Self {
        Self::MissingInput {
            input,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The tool's diagnostic output, when the failure came from FFmpeg.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// One-line description including the last diagnostic line, for job logs.
    pub fn summary(&self) -> String {
        match self.diagnostic().and_then(|d| d.lines().rev().find(|l| !l.trim().is_empty())) {
            Some(last) => format!("{}: {}", self, last.trim()),
            None => self.to_string(),
        }
    }
}

/// Fail with `MissingInput` unless `path` is an existing file.
pub fn require_file(input: MediaInput, path: &Path) -> MediaResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MediaError::missing_input(input, path))
    }
}
