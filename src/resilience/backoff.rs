//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryPolicyConfig;

/// Delay before retry `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
///
/// With jitter enabled the delay is resampled uniformly from [0, delay]
/// (full jitter); with it disabled the exact exponential sequence is
/// produced, which is what the backoff tests pin down.
pub fn delay_for(attempt: u32, policy: &RetryPolicyConfig) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = policy.base_delay_ms.saturating_mul(exponential_base);
    let capped = delay_ms.min(policy.max_delay_ms);

    let final_ms = if policy.jitter && capped > 0 {
        rand::thread_rng().gen_range(0..=capped)
    } else {
        capped
    };

    Duration::from_millis(final_ms)
}
