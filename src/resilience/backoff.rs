//! Backoff schedule for CDN and storage retries.

use std::time::Duration;

use rand::Rng;

/// Upper bound of the random jitter, as a fraction of the delay.
pub const JITTER_RATIO: f64 = 0.1;

/// Delay after failed attempt `attempt` (1-based) of a remote call.
///
/// `base` doubles per attempt up to `max`. Jitter keeps concurrent storage
/// deletions from retrying in lockstep. Attempt 0 never waits.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 || base.is_zero() {
        return Duration::ZERO;
    }

    let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
    let delay = base.saturating_mul(factor).min(max);
    let jitter = rand::thread_rng().gen_range(0.0..JITTER_RATIO);
    delay + delay.mul_f64(jitter)
}
