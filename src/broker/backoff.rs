//! Reconnect delay policy.

use core::time::Duration;

/// How long to wait after the `attempt`-th consecutive failed connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay after every failure.
    Constant(Duration),
    /// `initial * 2^(attempt-1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl ReconnectPolicy {
    /// Delay after failed attempt number `attempt` (1-based). Attempt 0 is
    /// treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Constant(d) => d,
            Self::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                initial
                    .checked_mul(1u32 << shift)
                    .map_or(max, |d| d.min(max))
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Constant(Duration::from_millis(3000))
    }
}
