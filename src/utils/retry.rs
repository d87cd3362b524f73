//! Retry utilities: backoff builder and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Every engine runs
//! its read-modify-commit loop under this policy, so a version conflict
//! from a concurrent writer is re-tried against fresh state instead of
//! surfacing to the caller.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::error::LoyaltyError;

/// Standard backoff for version-conflict retries.
///
/// - Min delay: 10ms
/// - Max delay: 2s
/// - Max attempts: 10
/// - Jitter enabled
pub fn conflict_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(10)
        .with_jitter()
}

/// Determines if a loyalty error is retryable (version conflict only).
///
/// Non-retryable: every domain rejection (`InsufficientPoints`,
/// `TierMismatch`, ...). These will never succeed on retry.
pub fn is_retryable(err: &LoyaltyError) -> bool {
    err.is_retryable()
}
