use crate::error::CameraError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Recovery action to take after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after a delay, still within the failure budget
    RetryAfterDelay(Duration),
    /// Budget exhausted; keep going at the reduced cadence
    Degrade(Duration),
}

/// Retry strategy configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Consecutive failures tolerated before degrading
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
    /// Delay once the budget is exhausted
    pub degraded_delay: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            exponential_backoff: true,
            degraded_delay: Duration::from_secs(3),
        }
    }
}

/// Counts consecutive failures of one operation and paces its retries
#[derive(Debug)]
pub struct RetryPolicy {
    config: RecoveryConfig,
    failures: u32,
}

impl RetryPolicy {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Record a failure and decide how long to wait before the next attempt
    pub fn on_failure(&mut self, operation: &str, error: &CameraError) -> RecoveryAction {
        self.failures = self.failures.saturating_add(1);

        if self.failures > self.config.max_retries {
            warn!(
                "{} failed {} times in a row ({}), continuing at reduced cadence",
                operation, self.failures, error
            );
            return RecoveryAction::Degrade(self.config.degraded_delay);
        }

        let delay = self.calculate_delay(self.failures - 1);
        debug!(
            "{} failed (attempt {}/{}): {}",
            operation, self.failures, self.config.max_retries, error
        );
        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset the failure count after a successful attempt
    pub fn on_success(&mut self, operation: &str) {
        if self.failures > 0 {
            info!("{} recovered after {} failures", operation, self.failures);
        }
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures > self.config.max_retries
    }

    /// Calculate delay for retry with exponential backoff
    fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.base_delay;
        }

        let factor = 2_u32.saturating_pow(retry_count.min(16));
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }
}

/// Run `op` until it succeeds, retrying transient failures with backoff.
/// Non-transient errors and an exhausted budget return the last error.
pub async fn retry_transient<T, F, Fut>(
    policy: &mut RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, CameraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CameraError>>,
{
    loop {
        match op().await {
            Ok(value) => {
                policy.on_success(operation);
                return Ok(value);
            }
            Err(error) if error.is_recoverable() => match policy.on_failure(operation, &error) {
                RecoveryAction::RetryAfterDelay(delay) => sleep(delay).await,
                RecoveryAction::Degrade(_) => return Err(error),
            },
            Err(error) => return Err(error),
        }
    }
}
