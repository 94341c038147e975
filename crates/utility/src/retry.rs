//! Exponential backoff for transient downstream failures (§7: base 100ms,
//! factor 1.6, capped at 30s, bounded by a caller-supplied attempt count).

use std::future::Future;
use std::time::Duration;

pub const BASE_DELAY: Duration = Duration::from_millis(100);
pub const BACKOFF_FACTOR: f64 = 1.6;
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Runs `action` up to `max_retries + 1` times, sleeping with exponential
/// backoff between attempts. Returns the last error if every attempt fails.
pub async fn with_backoff<T, E, F, Fut>(max_retries: u32, mut action: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    let mut delay = BASE_DELAY;
    loop {
        match action().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err);
                }
                tokio::time::sleep(delay).await;
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * BACKOFF_FACTOR).min(MAX_DELAY.as_secs_f64()),
                );
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(3, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("transient")
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_error_after_exhausting_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), &str> = with_backoff(2, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("still failing")
        })
        .await;
        assert_eq!(result, Err("still failing"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
