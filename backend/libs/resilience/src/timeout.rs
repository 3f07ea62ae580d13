/// Timeout wrappers for backend calls
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl TimeoutConfig {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            duration: Duration::from_millis(ms),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
}

/// Execute a future with timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(duration))
}

/// Execute a fallible future with timeout, folding an elapsed deadline into
/// the caller's own error type.
///
/// The inner error is returned unchanged, so stage attribution done by the
/// caller is not lost.
pub async fn with_deadline<F, T, E>(duration: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(E::from(TimeoutError::Elapsed(duration))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum CallError {
        Remote(&'static str),
        TimedOut(Duration),
    }

    impl From<TimeoutError> for CallError {
        fn from(err: TimeoutError) -> Self {
            match err {
                TimeoutError::Elapsed(d) => CallError::TimedOut(d),
            }
        }
    }

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_timeout_elapsed() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
    }

    #[tokio::test]
    async fn test_deadline_keeps_inner_error() {
        let result: Result<i32, CallError> = with_deadline(Duration::from_secs(1), async {
            Err(CallError::Remote("rejected"))
        })
        .await;

        assert_eq!(result, Err(CallError::Remote("rejected")));
    }

    #[tokio::test]
    async fn test_deadline_maps_elapsed() {
        let limit = Duration::from_millis(10);
        let result: Result<i32, CallError> = with_deadline(limit, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(1)
        })
        .await;

        assert_eq!(result, Err(CallError::TimedOut(limit)));
    }

    #[test]
    fn test_from_millis() {
        assert_eq!(
            TimeoutConfig::from_millis(1500).duration,
            Duration::from_millis(1500)
        );
    }
}
