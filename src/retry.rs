//! Bounded exponential backoff for reads against the document store.
//!
//! Only errors classified as transient are retried; anything else (not
//! found, constraint violations, permission denied) propagates on the first
//! attempt. Write paths never go through this wrapper.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(200);

/// Store outage shapes: connection drop, exhausted or closed pool.
pub fn is_transient(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed)
    )
}

pub async fn with_retry<T, F, Fut>(label: &str, op: F) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0u32;
    let mut delay = BASE_DELAY;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < MAX_RETRIES => {
                attempt += 1;
                warn!(label, attempt, error = %err, "transient store error, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> anyhow::Error {
        anyhow::Error::from(sqlx::Error::PoolTimedOut)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_success_after_two_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(unavailable())
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3); // two retries after the first attempt
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::Error::from(sqlx::Error::RowNotFound)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1 + MAX_RETRIES);
    }

    #[test]
    fn transient_classification_sees_through_context() {
        let err = anyhow::Error::from(sqlx::Error::PoolTimedOut).context("load biomarker");
        assert!(is_transient(&err));
        let err = anyhow::Error::from(sqlx::Error::RowNotFound).context("load biomarker");
        assert!(!is_transient(&err));
    }

    #[test]
    fn io_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(is_transient(&anyhow::Error::from(sqlx::Error::Io(io))));
    }
}
