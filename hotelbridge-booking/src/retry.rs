use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Exponential backoff: `initial_delay * multiplier^attempt`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries, ..Self::default() }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, `should_retry` says no, or retries run out.
/// Returns the last result together with the number of attempts made.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> (Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        let result = operation().await;
        attempt += 1;
        match result {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if attempt <= policy.max_retries && should_retry(&e) => {
                let delay = policy.delay_for_attempt(attempt - 1);
                tracing::debug!("Attempt {} failed, retrying in {:?}", attempt, delay);
                sleep(delay).await;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}
