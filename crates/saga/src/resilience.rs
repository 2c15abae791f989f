//! Retry, timeout, and circuit-breaker wrappers for remote step calls.
//!
//! Policies are plain data passed to the wrapper; the wrapper composes
//! around any client call instead of being woven in by interception.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::clients::ClientError;

/// Retry and timeout policy for one remote step.
#[derive(Debug, Clone)]
pub struct StepPolicy {
    /// Total attempt budget, including the first call.
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub backoff: Duration,

    /// Bounded wait per attempt; exceeding it counts as an unavailable
    /// response from the step.
    pub timeout: Duration,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Circuit breaker policy.
#[derive(Debug, Clone)]
pub struct BreakerPolicy {
    /// Consecutive transport failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a trial call is allowed.
    pub open_for: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
        }
    }
}

/// Terminal failure of a remote step after policies were applied.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// The service answered and said no.
    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    /// The service stayed unreachable through the attempt budget.
    #[error("{service} is unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// Every attempt ran past its timeout.
    #[error("{service} call timed out after {timeout:?}")]
    TimedOut {
        service: &'static str,
        timeout: Duration,
    },

    /// The circuit is open; the call fast-failed without touching the wire.
    #[error("{service} circuit is open, failing fast")]
    CircuitOpen { service: &'static str },
}

#[derive(Debug)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
}

/// Circuit breaker over consecutive transport failures.
///
/// Rejections do not count: a service that answers "no" is healthy. After
/// `open_for` elapses, one trial call is let through; its failure reopens
/// the circuit immediately.
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Returns true if a call may go through.
    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { until } => {
                if Instant::now() >= until {
                    // Half-open: one trial; a failure re-opens immediately.
                    *state = BreakerState::Closed {
                        consecutive_failures: self.policy.failure_threshold.saturating_sub(1),
                    };
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        *self.state.lock().unwrap() = BreakerState::Closed {
            consecutive_failures: 0,
        };
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        let failures = match *state {
            BreakerState::Closed {
                consecutive_failures,
            } => consecutive_failures + 1,
            BreakerState::Open { .. } => return,
        };
        if failures >= self.policy.failure_threshold {
            *state = BreakerState::Open {
                until: Instant::now() + self.policy.open_for,
            };
        } else {
            *state = BreakerState::Closed {
                consecutive_failures: failures,
            };
        }
    }

    /// Returns true if the circuit is currently open.
    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock().unwrap(), BreakerState::Open { until } if Instant::now() < until)
    }
}

/// Calls a remote capability under a step policy and circuit breaker.
///
/// Each attempt is bounded by the policy timeout. Transport failures and
/// timeouts are retried up to the attempt budget and counted toward the
/// breaker; rejections return immediately. While the circuit is open the
/// call fast-fails with `StepError::CircuitOpen`.
pub async fn call_with_policy<T, F, Fut>(
    service: &'static str,
    policy: &StepPolicy,
    breaker: &CircuitBreaker,
    mut call: F,
) -> Result<T, StepError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut last_error = StepError::Unavailable {
        service,
        message: "no attempt was made".to_string(),
    };

    for attempt in 1..=policy.max_attempts {
        if !breaker.try_acquire() {
            metrics::counter!("saga_step_fast_fails", "service" => service).increment(1);
            return Err(StepError::CircuitOpen { service });
        }

        match tokio::time::timeout(policy.timeout, call()).await {
            Ok(Ok(value)) => {
                breaker.record_success();
                return Ok(value);
            }
            Ok(Err(ClientError::Rejected(message))) => {
                // A definitive business answer; retrying cannot change it.
                breaker.record_success();
                return Err(StepError::Rejected { service, message });
            }
            Ok(Err(ClientError::Unavailable(message))) => {
                breaker.record_failure();
                tracing::warn!(service, attempt, %message, "step attempt failed");
                last_error = StepError::Unavailable { service, message };
            }
            Err(_) => {
                breaker.record_failure();
                tracing::warn!(service, attempt, timeout = ?policy.timeout, "step attempt timed out");
                last_error = StepError::TimedOut {
                    service,
                    timeout: policy.timeout,
                };
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    metrics::counter!("saga_step_retry_exhausted", "service" => service).increment(1);
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> StepPolicy {
        StepPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let breaker = CircuitBreaker::new(BreakerPolicy::default());
        let result: Result<u32, StepError> =
            call_with_policy("svc", &fast_policy(), &breaker, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let breaker = CircuitBreaker::new(BreakerPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<u32, StepError> =
            call_with_policy("svc", &fast_policy(), &breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClientError::Rejected("declined".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(StepError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn transient_failure_is_retried_until_success() {
        let breaker = CircuitBreaker::new(BreakerPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<u32, StepError> =
            call_with_policy("svc", &fast_policy(), &breaker, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ClientError::Unavailable("down".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let breaker = CircuitBreaker::new(BreakerPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<u32, StepError> =
            call_with_policy("svc", &fast_policy(), &breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClientError::Unavailable("still down".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(StepError::Unavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_counts_as_a_failed_attempt() {
        let breaker = CircuitBreaker::new(BreakerPolicy::default());
        let policy = StepPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(10),
        };

        let result: Result<u32, StepError> = call_with_policy("svc", &policy, &breaker, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;

        assert!(matches!(result, Err(StepError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_fast_fails() {
        let breaker = CircuitBreaker::new(BreakerPolicy {
            failure_threshold: 3,
            open_for: Duration::from_secs(60),
        });
        let calls = AtomicU32::new(0);

        let result: Result<u32, StepError> =
            call_with_policy("svc", &fast_policy(), &breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClientError::Unavailable("down".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert!(breaker.is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Next call must not reach the client at all.
        let result: Result<u32, StepError> =
            call_with_policy("svc", &fast_policy(), &breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            })
            .await;
        assert!(matches!(result, Err(StepError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn breaker_allows_trial_after_open_window() {
        let breaker = CircuitBreaker::new(BreakerPolicy {
            failure_threshold: 1,
            open_for: Duration::from_millis(20),
        });

        let _: Result<u32, StepError> = call_with_policy(
            "svc",
            &StepPolicy {
                max_attempts: 1,
                ..fast_policy()
            },
            &breaker,
            || async { Err(ClientError::Unavailable("down".to_string())) },
        )
        .await;
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Trial call succeeds and closes the circuit.
        let result: Result<u32, StepError> =
            call_with_policy("svc", &fast_policy(), &breaker, || async { Ok(5) }).await;
        assert_eq!(result.unwrap(), 5);
        assert!(!breaker.is_open());
    }
}
