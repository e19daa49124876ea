//! Retry for operations that fail on the network path

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use crate::utils::errors::Result;

/// Attempts used for booking saves
pub const BOOKING_SAVE_ATTEMPTS: u32 = 2;

/// Run `op` up to `attempts` times, retrying only network failures.
///
/// Any other error, or the network error of the last attempt, is returned as is.
pub async fn retry_on_network<T, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_network() && attempt < attempts => {
                warn!(attempt = attempt, max_attempts = attempts, error = %e, "Network error, retrying");
                attempt += 1;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::CbxError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retries_network_error_once() {
        let calls = AtomicU32::new(0);
        let result = tokio_test::block_on(retry_on_network(BOOKING_SAVE_ATTEMPTS, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(CbxError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(n)
                }
            }
        }));

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_gives_up_after_last_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = tokio_test::block_on(retry_on_network(BOOKING_SAVE_ATTEMPTS, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CbxError::Database(sqlx::Error::PoolTimedOut)) }
        }));

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_does_not_retry_data_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = tokio_test::block_on(retry_on_network(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CbxError::InvalidInput("bad".to_string())) }
        }));

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
