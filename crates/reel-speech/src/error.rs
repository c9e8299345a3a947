//! Speech backend error types.

use reel_media::MediaError;
use thiserror::Error;

pub type SpeechResult<T> = Result<T, SpeechError>;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Speech service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl SpeechError {
    /// Map a transport error, folding client-side timeouts into `Timeout`.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            SpeechError::Timeout(timeout_secs)
        } else {
            SpeechError::Network(err)
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("{}: {}", status, body.trim());
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            SpeechError::ServiceUnavailable(message)
        } else {
            SpeechError::RequestFailed(message)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpeechError::ServiceUnavailable(_) | SpeechError::Timeout(_) | SpeechError::Network(_)
        )
    }
}
