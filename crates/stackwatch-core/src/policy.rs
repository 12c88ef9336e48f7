use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long [`crate::driver::stream`] keeps polling while the event source is unavailable.
///
/// Counts consecutive failed rounds, not individual requests. Streamers never retry on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Failed rounds in a row tolerated before the driver stops every streamer.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Give up on the first failed round.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }

    /// Poll again right away, up to `max_retries` failed rounds in a row.
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: 0,
            backoff_factor: 1.0,
            max_backoff_ms: 0,
        }
    }

    /// Backoff of `initial_backoff_ms * backoff_factor^(n-1)` for the n-th retry, capped at 30 s. Zero or negative
    /// inputs fall back to 1 s and a factor of 2.
    pub fn exponential(max_retries: u32, initial_backoff_ms: u64, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: match initial_backoff_ms {
                0 => default_initial_backoff_ms(),
                ms => ms,
            },
            backoff_factor: if backoff_factor > 0.0 {
                backoff_factor
            } else {
                default_backoff_factor()
            },
            max_backoff_ms: default_max_backoff_ms(),
        }
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms.max(1);
        self
    }

    /// Wait before the next round after `failed_rounds` consecutive failures, counting the one
    /// just seen. `None` once the policy is exhausted.
    pub fn retry_delay(&self, failed_rounds: u32) -> Option<Duration> {
        if failed_rounds == 0 || failed_rounds > self.max_retries {
            return None;
        }
        if self.initial_backoff_ms == 0 {
            return Some(Duration::ZERO);
        }
        let exp = self.backoff_factor.powi(failed_rounds as i32 - 1);
        let scaled = (self.initial_backoff_ms as f64 * exp).round() as u64;
        Some(Duration::from_millis(scaled.min(self.max_backoff_ms.max(1))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_gives_up_on_first_failure() {
        assert_eq!(RetryPolicy::none().retry_delay(1), None);
        assert_eq!(RetryPolicy::default(), RetryPolicy::none());
    }

    #[test]
    fn backoff_doubles_until_capped_then_runs_out() {
        let p = RetryPolicy::exponential(4, 100, 2.0).with_max_backoff_ms(350);
        let delays: Vec<_> = (1..=5).map(|n| p.retry_delay(n)).collect();
        assert_eq!(
            delays,
            vec![
                Some(Duration::from_millis(100)),
                Some(Duration::from_millis(200)),
                Some(Duration::from_millis(350)),
                Some(Duration::from_millis(350)),
                None,
            ]
        );
    }

    #[test]
    fn immediate_retries_without_waiting() {
        let p = RetryPolicy::immediate(2);
        assert_eq!(p.retry_delay(2), Some(Duration::ZERO));
        assert_eq!(p.retry_delay(3), None);
    }

    #[test]
    fn zero_inputs_fall_back_to_defaults() {
        let p = RetryPolicy::exponential(1, 0, -1.0);
        assert_eq!(p.retry_delay(1), Some(Duration::from_secs(1)));
    }

    #[test]
    fn policy_loads_from_partial_json() {
        let p: RetryPolicy =
            serde_json::from_str(r#"{"max_retries": 4, "max_backoff_ms": 5000}"#).unwrap();
        assert_eq!(p.max_retries, 4);
        assert_eq!(p.initial_backoff_ms, 1_000);
        assert_eq!(p.retry_delay(4), Some(Duration::from_millis(5_000)));
    }
}
