//! Streamer configuration.

use std::time::Duration;

use crate::error::StreamError;

/// Environment variable overriding the fetch interval, in milliseconds.
pub const FETCH_INTERVAL_ENV: &str = "STACKWATCH_FETCH_INTERVAL_MS";

const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(3);

/// Settings shared by stack streamers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamerConfig {
    /// Delay between a fetch and the suggested next fetch.
    pub fetch_interval: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            fetch_interval: DEFAULT_FETCH_INTERVAL,
        }
    }
}

impl StreamerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the fetch interval.
    pub fn fetch_interval(mut self, interval: Duration) -> Self {
        self.fetch_interval = interval;
        self
    }

    /// Builds a config from [`FETCH_INTERVAL_ENV`], falling back to defaults when unset.
    pub fn from_env() -> Result<Self, StreamError> {
        match std::env::var(FETCH_INTERVAL_ENV) {
            Ok(raw) => Self::default().with_interval_ms(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    fn with_interval_ms(self, raw: &str) -> Result<Self, StreamError> {
        let ms: u64 = raw.trim().parse().map_err(|_| {
            StreamError::Config(format!("{FETCH_INTERVAL_ENV} must be milliseconds, got {raw:?}"))
        })?;
        if ms == 0 {
            return Err(StreamError::Config(format!(
                "{FETCH_INTERVAL_ENV} must be greater than zero"
            )));
        }
        Ok(self.fetch_interval(Duration::from_millis(ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_three_seconds() {
        assert_eq!(StreamerConfig::default().fetch_interval, Duration::from_secs(3));
    }

    #[test]
    fn interval_parses_milliseconds() {
        let c = StreamerConfig::default().with_interval_ms(" 250 ").unwrap();
        assert_eq!(c.fetch_interval, Duration::from_millis(250));
    }

    #[test]
    fn invalid_interval_is_config_error() {
        let err = StreamerConfig::default().with_interval_ms("soon").unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
        let err = StreamerConfig::default().with_interval_ms("0").unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
