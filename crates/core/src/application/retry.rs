// Retrying executor
//
// Runs an operation against a pooled channel up to `max_attempts` times. A
// channel fault on any attempt but the last evicts the channel and waits the
// fixed retry delay, so the next attempt starts on a fresh channel.
use super::pool::{ChannelPool, PooledChannel};
use crate::domain::TargetDescriptor;
use crate::port::ChannelError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    Retry(Duration),
    /// Attempts exhausted
    Failed,
}

/// Fixed-delay retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Attempts per operation, first try included (at least 1)
    /// * `retry_delay` - Pause before each retry
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Decide what happens after `attempt` (1-based) faulted
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Failed;
        }
        RetryDecision::Retry(self.retry_delay)
    }
}

/// Every attempt of an operation faulted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("operation failed after {attempts} attempts; last error: {last_error}")]
pub struct RetriesExhausted {
    pub attempts: u32,
    pub last_error: String,
}

/// Executes operations against pooled channels with bounded retries
pub struct RetryingExecutor {
    pool: Arc<ChannelPool>,
    policy: RetryPolicy,
}

impl RetryingExecutor {
    pub fn new(pool: Arc<ChannelPool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn pool(&self) -> &Arc<ChannelPool> {
        &self.pool
    }

    /// Run `op` on the channel for `target` until it returns a value
    ///
    /// Any `Ok` is final, whatever it carries; only channel faults (including
    /// failing to acquire a channel) are retried.
    ///
    /// # Errors
    /// - RetriesExhausted carrying the last fault once every attempt faulted
    pub async fn execute<T, F, Fut>(
        &self,
        target: &TargetDescriptor,
        op: F,
    ) -> Result<T, RetriesExhausted>
    where
        F: Fn(Arc<PooledChannel>) -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let key = target.pool_key();
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            let outcome = match self.pool.acquire(target).await {
                Ok(channel) => op(channel).await,
                Err(e) => Err(e),
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        info!(key = %key, attempt = %attempt, "Operation recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            match self.policy.decide(attempt) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        key = %key,
                        attempt = %attempt,
                        max_attempts = %self.policy.max_attempts,
                        delay_ms = %delay.as_millis(),
                        error = %error,
                        "Channel fault, retrying on a fresh channel"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    self.pool.evict(&key).await;
                }
                RetryDecision::Failed => {
                    warn!(
                        key = %key,
                        attempts = %attempt,
                        error = %error,
                        "Max retry attempts reached"
                    );
                }
            }
            last_error = Some(error.to_string());
        }

        debug!(key = %key, "Giving up");
        Err(RetriesExhausted {
            attempts: self.policy.max_attempts,
            last_error: last_error.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::channel::mocks::{MockConnector, MockHost};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::CommandOutput;
    use tokio_test::{assert_err, assert_ok};

    fn executor(host: &Arc<MockHost>, max_attempts: u32) -> RetryingExecutor {
        let pool = ChannelPool::new(
            Arc::new(MockConnector::new(Arc::clone(host))),
            Arc::new(ManualTimeProvider::new(0)),
            Arc::new(SequentialIdProvider::default()),
            Duration::from_secs(300),
        );
        RetryingExecutor::new(Arc::new(pool), RetryPolicy::new(max_attempts, Duration::ZERO))
    }

    async fn echo(channel: Arc<PooledChannel>) -> Result<CommandOutput, ChannelError> {
        channel.invoke("echo hi").await
    }

    #[test]
    fn test_policy_decisions() {
        let policy = RetryPolicy::new(3, Duration::from_millis(5));
        assert_eq!(policy.decide(1), RetryDecision::Retry(Duration::from_millis(5)));
        assert_eq!(policy.decide(2), RetryDecision::Retry(Duration::from_millis(5)));
        assert_eq!(policy.decide(3), RetryDecision::Failed);
    }

    #[test]
    fn test_policy_needs_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.decide(1), RetryDecision::Failed);
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let host = MockHost::new();
        let executor = executor(&host, 3);

        let output = assert_ok!(executor.execute(&TargetDescriptor::new("H1"), echo).await);

        assert!(output.succeeded());
        assert_eq!(host.opened(), 1);
        assert_eq!(host.total_close_calls(), 0);
    }

    #[tokio::test]
    async fn test_recovers_after_two_faults() {
        let host = MockHost::new();
        host.fail_next_invocations(2, "broken pipe");
        let executor = executor(&host, 3);

        let result = executor.execute(&TargetDescriptor::new("H1"), echo).await;

        assert!(result.is_ok());
        assert_eq!(host.invocation_count("echo hi"), 3);
        assert_eq!(host.opened(), 3);
        assert_eq!(host.close_calls(0), 1);
        assert_eq!(host.close_calls(1), 1);
        assert_eq!(host.close_calls(2), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let host = MockHost::new();
        host.fail_next_invocations(2, "broken pipe");
        host.fail_next_invocations(1, "host unreachable");
        let executor = executor(&host, 3);

        let err = assert_err!(executor.execute(&TargetDescriptor::new("H1"), echo).await);

        assert_eq!(err.attempts, 3);
        assert!(err.last_error.contains("host unreachable"));
        assert!(err.to_string().contains("after 3 attempts"));
        // The channel from the last attempt stays pooled
        assert_eq!(host.total_close_calls(), 2);
        assert_eq!(executor.pool().len().await, 1);
    }

    #[tokio::test]
    async fn test_open_failure_consumes_an_attempt() {
        let host = MockHost::new();
        host.fail_next_opens(1, "connection refused");
        let executor = executor(&host, 2);

        let result = executor.execute(&TargetDescriptor::new("H1"), echo).await;

        assert!(result.is_ok());
        assert_eq!(host.opened(), 1);
        assert_eq!(host.invocation_count("echo hi"), 1);
    }

    #[tokio::test]
    async fn test_ok_value_is_never_retried() {
        let host = MockHost::new();
        let executor = executor(&host, 3);

        let verdict: Result<bool, RetriesExhausted> = executor
            .execute(&TargetDescriptor::new("H1"), |channel| async move {
                channel.invoke("false").await.map(|_| false)
            })
            .await;

        assert_eq!(verdict, Ok(false));
        assert_eq!(host.invocation_count("false"), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_does_not_evict() {
        let host = MockHost::new();
        host.fail_next_invocations(1, "broken pipe");
        let executor = executor(&host, 1);

        let result = executor.execute(&TargetDescriptor::new("H1"), echo).await;

        assert!(result.is_err());
        assert_eq!(host.total_close_calls(), 0);
    }
}
