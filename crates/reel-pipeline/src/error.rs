//! Pipeline error types.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Caller-supplied input of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Script,
    Background,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Script => f.write_str("script"),
            InputKind::Background => f.write_str("background video"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input not found: {input} at {}", path.display())]
    InputNotFound { input: InputKind, path: PathBuf },

    #[error("Voice synthesis failed: {0}")]
    VoiceSynthesis(String),

    #[error("Alignment failed: {0}")]
    Alignment(String),

    #[error("Compositing failed: {0}")]
    Composite(String),

    #[error("Thumbnail failed: {0}")]
    Thumbnail(String),

    #[error("Compression failed: {0}")]
    Compress(String),

    #[error("Workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn input_not_found(input: InputKind, path: impl AsRef<Path>) -> Self {
        Self::InputNotFound {
            input,
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn workspace(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_not_found_message() {
        let err = PipelineError::input_not_found(InputKind::Background, "/bg.mp4");
        assert_eq!(err.to_string(), "Input not found: background video at /bg.mp4");
        assert!(matches!(err, PipelineError::InputNotFound { input: InputKind::Background, .. }));
    }
}
