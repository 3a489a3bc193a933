//! Retry policy and backoff schedule
//!
//! Stateless backoff strategy: exponential growth with jitter, bounded by
//! a delay ceiling and an attempt cap. Quota failures reuse the same
//! shape with a longer base so rate-limited collaborators get real
//! breathing room.

use std::time::Duration;

use crate::domain::gateways::FailureKind;
use crate::engine::classifier::Classification;
use crate::infrastructure::config::RetryConfig;

/// Decides whether and when an item is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    quota_backoff_base: Duration,
    jitter: f64,
}

impl RetryPolicy {
    /// Builds a policy from retry configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            quota_backoff_base: Duration::from_millis(config.quota_backoff_base_ms),
            jitter: config.backoff_jitter.clamp(0.0, 1.0),
        }
    }

    /// Attempt cap, including the first attempt.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` when the item is done.
    ///
    /// `attempts` counts attempts already made (≥ 1). Permanent failures
    /// stop immediately; transient failures back off exponentially with
    /// jitter until the attempt cap.
    #[must_use]
    pub fn next_delay(
        &self,
        classification: Classification,
        kind: &FailureKind,
        attempts: u32,
    ) -> Option<Duration> {
        if classification == Classification::Permanent {
            return None;
        }
        if attempts >= self.max_attempts {
            return None;
        }

        let base = if matches!(kind, FailureKind::QuotaExceeded { .. }) {
            self.quota_backoff_base
        } else {
            self.backoff_base
        };

        let exponent = attempts.saturating_sub(1).min(20);
        let raw_ms = base
            .as_millis()
            .saturating_mul(1u128 << exponent)
            .min(self.backoff_max.as_millis());

        // Jitter spreads simultaneous retries; the ceiling still holds.
        let spread = 1.0 + self.jitter * (2.0 * fastrand::f64() - 1.0);
        let jittered = (raw_ms as f64 * spread) as u64;
        let bounded = jittered.min(self.backoff_max.as_millis() as u64);

        Some(Duration::from_millis(bounded))
    }
}

/// Transient per-item retry bookkeeping, discarded on terminal outcome.
#[derive(Debug, Default)]
pub struct BackoffState {
    /// Attempts made so far.
    pub attempts: u32,
    /// Delay scheduled before the next attempt, if any.
    pub next_delay: Option<Duration>,
}
