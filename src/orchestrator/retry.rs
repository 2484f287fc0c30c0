use std::time::Duration;

use crate::config::{BackoffKind, OrchestratorConfig};

/// Delay between attempts on the same chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// `base * attempt`: 1x before the 2nd attempt, 2x before the 3rd, ...
    Linear(Duration),
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Linear(d) => d.saturating_mul(attempt.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let delay = config.retry_delay();
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed(delay),
            BackoffKind::Linear => Backoff::Linear(delay),
        };

        Self {
            max_attempts: config.max_attempts.max(1),
            backoff,
        }
    }
}
