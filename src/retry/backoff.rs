use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff tier: `slot * 2^min(attempt, ceiling)`, jittered down to
/// `jitter_limit` of that value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    pub slot: Duration,
    pub ceiling: u32,
    /// Lower bound of the jitter factor in `[0, 1]`; `1.0` disables jitter.
    pub jitter_limit: f64,
}

impl Backoff {
    /// Tier for contention-style failures.
    pub const FAST: Self = Self {
        slot: Duration::from_millis(5),
        ceiling: 6,
        jitter_limit: 1.0,
    };

    /// Tier for overload-style failures.
    pub const SLOW: Self = Self {
        slot: Duration::from_secs(1),
        ceiling: 6,
        jitter_limit: 0.5,
    };

    #[must_use]
    pub fn new(slot: Duration, ceiling: u32, jitter_limit: f64) -> Self {
        Self {
            slot,
            ceiling,
            jitter_limit: jitter_limit.clamp(0.0, 1.0),
        }
    }

    /// Upper bound of the delay for `attempt`, before jitter.
    #[must_use]
    pub fn ceiling_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(self.ceiling).min(31);
        self.slot.saturating_mul(1_u32 << shift)
    }

    /// `jitter_limit` clamped into `[0, 1]`; NaN disables jitter.
    #[must_use]
    pub fn effective_jitter_limit(&self) -> f64 {
        if self.jitter_limit.is_nan() {
            1.0
        } else {
            self.jitter_limit.clamp(0.0, 1.0)
        }
    }

    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let max = self.ceiling_delay(attempt);
        let limit = self.effective_jitter_limit();
        if limit >= 1.0 {
            return max;
        }
        let factor = rand::rng().random_range(limit..=1.0);
        max.mul_f64(factor)
    }
}
