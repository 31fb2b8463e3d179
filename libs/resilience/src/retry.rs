/// Bounded fixed-delay retry gated by an error-class predicate
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial call
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Execute a future with bounded retry.
///
/// The operation is attempted once, then retried up to `config.max_retries`
/// times with `config.delay` between attempts, but only while `should_retry`
/// classifies the error as transient. The last error is returned unchanged so
/// callers can surface it.
pub async fn retry_fixed<F, Fut, T, E, P>(
    config: RetryConfig,
    should_retry: P,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    return Err(e);
                }

                attempt += 1;

                if attempt > config.max_retries {
                    warn!("max retries ({}) reached: {}", config.max_retries, e);
                    return Err(e);
                }

                warn!(
                    "retry attempt {}/{}, waiting {:?}: {}",
                    attempt, config.max_retries, config.delay, e
                );

                tokio::time::sleep(config.delay).await;
            }
        }
    }
}
