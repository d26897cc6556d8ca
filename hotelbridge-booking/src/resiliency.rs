use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failing fast
    HalfOpen, // Testing whether the supplier is back
}

pub struct CircuitBreaker {
    pub name: String,
    state: RwLock<CircuitState>,
    failure_count: AtomicUsize,
    success_count: AtomicUsize,
    failure_threshold: usize,
    success_threshold: usize,
    reset_timeout: Duration,
    last_failure: RwLock<Option<Instant>>,
    /// Start of the single call let through while half-open.
    trial_started: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, failure_threshold: usize, success_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            success_count: AtomicUsize::new(0),
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            reset_timeout,
            last_failure: RwLock::new(None),
            trial_started: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Whether a call may go through right now.
    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        if state == CircuitState::Closed {
            return true;
        }

        if state == CircuitState::Open {
            let last_fail = *self.last_failure.read().await;
            if let Some(instant) = last_fail {
                if instant.elapsed() > self.reset_timeout {
                    let mut s = self.state.write().await;
                    if *s == CircuitState::Open {
                        *s = CircuitState::HalfOpen;
                        self.success_count.store(0, Ordering::SeqCst);
                        *self.trial_started.write().await = None;
                        tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                    }
                } else {
                    return false;
                }
            } else {
                return false;
            }
        }

        if *self.state.read().await == CircuitState::Closed {
            return true;
        }
        self.try_start_trial().await
    }

    /// One trial call at a time. A trial call that never reports back (its
    /// caller was dropped) is replaced after `reset_timeout`.
    async fn try_start_trial(&self) -> bool {
        let mut trial = self.trial_started.write().await;
        match *trial {
            Some(started) if started.elapsed() <= self.reset_timeout => false,
            _ => {
                *trial = Some(Instant::now());
                true
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        match *state {
            CircuitState::HalfOpen => {
                *self.trial_started.write().await = None;
                let successes = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.success_threshold {
                    *state = CircuitState::Closed;
                    self.failure_count.store(0, Ordering::SeqCst);
                    tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
                }
            }
            CircuitState::Closed => self.failure_count.store(0, Ordering::SeqCst),
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.trial_started.write().await = None;
            let mut last = self.last_failure.write().await;
            *last = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trips_after_threshold() {
        let cb = CircuitBreaker::new("supplier", 3, 1, Duration::from_secs(60));
        for _ in 0..2 {
            cb.record_failure().await;
            assert!(cb.check().await);
        }
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(!cb.check().await);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("supplier", 2, 1, Duration::from_secs(60));
        cb.record_failure().await;
        cb.record_success().await;
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_needs_enough_successes() {
        let cb = CircuitBreaker::new("supplier", 1, 2, Duration::from_millis(10));
        cb.record_failure().await;
        assert!(!cb.check().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cb.check().await);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::HalfOpen);
        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_lets_one_caller_through() {
        let cb = CircuitBreaker::new("supplier", 1, 2, Duration::from_millis(50));
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cb.check().await);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);
        assert!(!cb.check().await);
        assert!(!cb.check().await);

        // The trial call reported back, so the next one may go
        cb.record_success().await;
        assert!(cb.check().await);
        assert!(!cb.check().await);
        cb.record_success().await;

        assert_eq!(cb.state().await, CircuitState::Closed);
        assert!(cb.check().await);
        assert!(cb.check().await);
    }

    #[tokio::test]
    async fn test_silent_trial_call_is_replaced() {
        let cb = CircuitBreaker::new("supplier", 1, 1, Duration::from_millis(20));
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cb.check().await);
        assert!(!cb.check().await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cb.check().await);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new("supplier", 1, 1, Duration::from_millis(10));
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cb.check().await);
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }
}
