use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{SpeechError, SpeechResult};

/// Upper bound on configured retries.
pub(crate) const MAX_RETRIES: u32 = 10;

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before retry `attempt` (zero-based), doubling up to [`MAX_BACKOFF`].
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor)).min(MAX_BACKOFF)
}

/// Run `operation`, retrying retryable failures with exponential backoff.
pub(crate) async fn with_retry<F, Fut, T>(label: &str, max_retries: u32, operation: F) -> SpeechResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = SpeechResult<T>>,
{
    let max_retries = max_retries.min(MAX_RETRIES);
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(attempt);
                warn!(
                    "{} request failed (attempt {}), retrying in {:?}: {}",
                    label,
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| SpeechError::RequestFailed(format!("{label}: no attempt made"))))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(6), MAX_BACKOFF);
        assert_eq!(backoff_delay(64), MAX_BACKOFF);
        assert_eq!(backoff_delay(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_count_is_clamped() {
        let calls = AtomicU32::new(0);
        let result: SpeechResult<()> = with_retry("test", u32::MAX, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SpeechError::ServiceUnavailable("503".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn test_retries_only_retryable() {
        let calls = AtomicU32::new(0);
        let result: SpeechResult<()> = with_retry("test", 2, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SpeechError::RequestFailed("400".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", 2, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SpeechError::ServiceUnavailable("503".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
