//! Exponential backoff for transient provider failures: base 500ms, cap
//! 4s, max 3 attempts; only `ProviderTimeout`/`ProviderTransport` are
//! retried.

use ae_domain::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

const BASE: Duration = Duration::from_millis(500);
const CAP: Duration = Duration::from_secs(4);
const MAX_ATTEMPTS: u32 = 3;

/// Run `f` up to `MAX_ATTEMPTS` times, sleeping with exponential backoff
/// between attempts when the error is retryable. The first attempt is not
/// delayed.
pub async fn with_backoff<T, F, Fut>(mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err: Option<Error> = None;
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            let delay = (BASE * 2u32.pow(attempt - 1)).min(CAP);
            tokio::time::sleep(delay).await;
        }
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Other("retry loop exited without an error".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Error>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::ProviderTransport("boom".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_non_retryable_errors() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(Error::ProviderAuth("bad key".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(Error::ProviderTimeout("slow".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
