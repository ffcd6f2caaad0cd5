/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::Duration;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(20);

/// Exponential backoff with jitter for retrying transient remote failures.
///
/// The policy is an immutable value handed to each retrying call site;
/// attempt counters travel with the call, never in shared state.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with an explicit base delay, growth factor, and cap
    pub fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// The jittered delay to wait before retry number `attempt` (0-indexed).
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.max(1.0).powi(attempt.min(31) as i32);
        let ceiling = self
            .initial_delay
            .mul_f64(exp)
            .min(self.max_delay);
        // jitter in [ceiling/2, ceiling]
        ceiling.mul_f64(0.5 + fastrand::f64() / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::BackoffPolicy;
    use std::time::Duration;

    #[test]
    fn test_delay_grows_exponentially_within_jitter_bounds() {
        let policy = BackoffPolicy::default();
        for attempt in 0..5u32 {
            let ceiling = Duration::from_millis(200 * 2u64.pow(attempt));
            let delay = policy.delay(attempt);
            assert!(delay <= ceiling, "attempt {attempt}: {delay:?} > {ceiling:?}");
            assert!(
                delay >= ceiling / 2,
                "attempt {attempt}: {delay:?} < {:?}",
                ceiling / 2
            );
        }
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = BackoffPolicy::default();
        // 200ms * 2^10 is well past the 20s cap
        assert!(policy.delay(10) <= Duration::from_secs(20));
    }

    #[test]
    fn test_large_attempt_counts_do_not_overflow() {
        let policy = BackoffPolicy::default();
        assert!(policy.delay(u32::MAX) <= Duration::from_secs(20));
    }
}
