//! Retry policy with optional backoff and jitter between attempts.
//!
//! Every failure counts toward the attempt budget; the policy only decides
//! how many attempts are allowed and how long to wait between them. The
//! default waits zero milliseconds, i.e. retries immediately.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base (constant)
    #[default]
    Constant,
    /// delay = base * retry
    Linear,
    /// delay = base * 2^(retry - 1)
    Exponential,
}

/// Jitter strategy to spread out retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// How many times a task's operation may be attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    #[serde(default)]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts with no delay.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
        }
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the base delay from a duration.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Attempts actually allowed; never less than one.
    #[must_use]
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait before retry number `retry` (1 = first retry).
    #[must_use]
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;
        if base == 0 {
            return Duration::ZERO;
        }

        let delay = match self.backoff {
            BackoffStrategy::Constant => base,
            BackoffStrategy::Linear => base.saturating_mul(u64::from(retry.max(1))),
            BackoffStrategy::Exponential => {
                base.saturating_mul(2u64.saturating_pow(retry.saturating_sub(1)))
            }
        }
        .min(max);

        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => rand::thread_rng().gen_range(0..=delay),
            JitterStrategy::Equal => {
                let half = delay / 2;
                half + rand::thread_rng().gen_range(0..=delay - half)
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Attempt bookkeeping for one task execution.
#[derive(Debug, Default)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the next attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Returns the number of attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Returns true if no attempts remain under `max_attempts`.
    #[must_use]
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.attempt >= max_attempts.max(1)
    }
}
