// SPDX-License-Identifier: MIT

//! Cumulative usage counters shared by every invocation path of a run

use crate::adk::model::Usage;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters; hand out `Arc<UsageCounters>` to concurrent dispatches
#[derive(Debug, Default)]
pub struct UsageCounters {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_usage(usage: Usage) -> Self {
        Self {
            prompt_tokens: AtomicU64::new(usage.prompt_tokens),
            completion_tokens: AtomicU64::new(usage.completion_tokens),
            total_tokens: AtomicU64::new(usage.total_tokens),
        }
    }

    pub fn add(&self, usage: Usage) {
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens
            .fetch_add(usage.total_tokens, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.prompt_tokens.store(0, Ordering::Relaxed);
        self.completion_tokens.store(0, Ordering::Relaxed);
        self.total_tokens.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(UsageCounters::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let counters = counters.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        counters.add(Usage::new(2, 1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(counters.snapshot(), Usage::new(6400, 3200));
    }

    #[test]
    fn test_from_usage_and_clear() {
        let counters = UsageCounters::from_usage(Usage::new(5, 5));
        assert_eq!(counters.snapshot().total_tokens, 10);
        counters.clear();
        assert_eq!(counters.snapshot(), Usage::default());
    }
}
