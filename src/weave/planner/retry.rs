// SPDX-License-Identifier: MIT

//! Exponential backoff for planner calls

use crate::adk::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    4
}

fn default_max_delay() -> u64 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    /// Wait before retrying after failed attempt `attempt` (1-based):
    /// `2^attempt` seconds clamped to `[base_delay_secs, max_delay_secs]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let secs = exp.clamp(self.base_delay_secs, self.max_delay_secs.max(self.base_delay_secs));
        Duration::from_secs(secs)
    }

    /// Run `op` until it succeeds or the attempts are used up
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        let delay = self.delay_for(attempt);
                        log::warn!(
                            "{} failed (attempt {}/{}): {}; retrying in {:?}",
                            label,
                            attempt,
                            attempts,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        log::error!("{} failed after {} attempts: {}", label, attempts, last_error);
        Err(ModelError::RetriesExhausted {
            attempts,
            last_error,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::WeaveError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(70), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let value = RetryPolicy::immediate(3)
            .run("decompose", || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WeaveError::other("flaky"))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = RetryPolicy::immediate(3)
            .run("decompose", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(WeaveError::other("down"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err,
            WeaveError::Model(ModelError::RetriesExhausted { attempts: 3, .. })
        ));
    }
}
