//! Configuration for the client mirror.

use crate::error::{MirrorError, MirrorResult};
use rand::Rng;
use std::time::Duration;

/// Configuration for the mirror runtime.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Retry policy for snapshot pulls during a resync.
    pub retry: RetryConfig,
    /// Repull rounds in one resync chain that start without delay.
    ///
    /// Later rounds back off using `retry`, so continuous update pressure
    /// during a pull cannot turn into a pull storm.
    pub immediate_repulls: u32,
    /// Attempts for the initial snapshot pull at startup.
    pub initial_pull_attempts: u32,
}

impl MirrorConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            immediate_repulls: 3,
            initial_pull_attempts: 3,
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the number of repull rounds that start without delay.
    pub fn with_immediate_repulls(mut self, rounds: u32) -> Self {
        self.immediate_repulls = rounds;
        self
    }

    /// Sets the attempts for the initial snapshot pull.
    pub fn with_initial_pull_attempts(mut self, attempts: u32) -> Self {
        self.initial_pull_attempts = attempts;
        self
    }

    /// Checks the configuration for inconsistencies.
    pub fn validate(&self) -> MirrorResult<()> {
        if self.initial_pull_attempts == 0 {
            return Err(MirrorError::InvalidConfig(
                "initial_pull_attempts must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }

    /// Returns the delay before the given repull round (1-indexed).
    pub fn repull_delay(&self, round: u32) -> Duration {
        if round <= self.immediate_repulls {
            Duration::ZERO
        } else {
            self.retry.delay_for_attempt(round - self.immediate_repulls)
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts; `None` retries until success or shutdown.
    pub max_attempts: Option<u32>,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration with a bounded number of attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration that retries until success or shutdown.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::new(1)
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Returns true if another attempt is allowed after `attempts_made`.
    pub fn allows_attempt(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }

    /// Checks the configuration for inconsistencies.
    pub fn validate(&self) -> MirrorResult<()> {
        if self.max_attempts == Some(0) {
            return Err(MirrorError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err(MirrorError::InvalidConfig(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(MirrorError::InvalidConfig(
                "initial_delay exceeds max_delay".into(),
            ));
        }
        Ok(())
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen_range(0.0..1.0);
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::unbounded()
    }
}
