//! Process-wide logging setup.
//!
//! Streamer logs are grouped under a `stack` span carrying the stack name (see [`stack_span`]),
//! so JSONL output can be filtered per stack when several streamers share one process.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::error::StreamError;

pub const ENABLED_ENV: &str = "STACKWATCH_OBSERVABILITY_ENABLED";
pub const LOG_LEVEL_ENV: &str = "STACKWATCH_LOG_LEVEL";
pub const JSON_LOG_PATH_ENV: &str = "STACKWATCH_JSON_LOG_PATH";

static INIT: OnceCell<()> = OnceCell::new();

/// Logging settings. `filter` takes precedence over `RUST_LOG`; the default level is `info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub filter: Option<String>,
    /// JSONL log file. Console output on stderr when `None`.
    pub json_log_path: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: None,
            json_log_path: None,
        }
    }
}

impl ObservabilityConfig {
    /// Reads [`ENABLED_ENV`], [`LOG_LEVEL_ENV`] and [`JSON_LOG_PATH_ENV`].
    pub fn from_env() -> Result<Self, StreamError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StreamError> {
        let enabled = match lookup(ENABLED_ENV) {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                StreamError::Config(format!("{ENABLED_ENV} must be a boolean, got {raw:?}"))
            })?,
            None => true,
        };
        Ok(Self {
            enabled,
            filter: lookup(LOG_LEVEL_ENV).filter(|f| !f.trim().is_empty()),
            json_log_path: lookup(JSON_LOG_PATH_ENV)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    fn env_filter(&self) -> Result<EnvFilter, StreamError> {
        match &self.filter {
            Some(directives) => EnvFilter::try_new(directives).map_err(|e| {
                StreamError::Config(format!("{LOG_LEVEL_ENV} {directives:?} is not a valid filter: {e}"))
            }),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Span that scopes one stack's streamer logs.
pub fn stack_span(stack_name: &str) -> tracing::Span {
    tracing::info_span!("stack", stack = %stack_name)
}

/// Initializes logging from the environment. Later calls are no-ops once one has succeeded.
pub fn init_observability() -> Result<(), StreamError> {
    init_with(ObservabilityConfig::from_env()?)
}

/// Initializes logging from `config`. Later calls are no-ops once one has succeeded.
pub fn init_with(config: ObservabilityConfig) -> Result<(), StreamError> {
    INIT.get_or_try_init(|| {
        if !config.enabled {
            return Ok(());
        }
        let filter = config.env_filter()?;
        match &config.json_log_path {
            Some(path) => init_json(filter, path),
            None => init_console(filter),
        }
    })
    .map(|_| ())
}

fn init_json(filter: EnvFilter, path: &Path) -> Result<(), StreamError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StreamError::Config(format!("{} has no file name", path.display())))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .map_err(|e| StreamError::Observability(format!("create {}: {e}", dir.display())))?;

    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(false)
        .with_writer(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| StreamError::Observability(e.to_string()))
}

fn init_console(filter: EnvFilter) -> Result<(), StreamError> {
    // stdout is left to the event consumers.
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| StreamError::Observability(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ObservabilityConfig, StreamError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_env_uses_defaults() {
        assert_eq!(config(&[]).unwrap(), ObservabilityConfig::default());
    }

    #[test]
    fn reads_level_and_log_path() {
        let c = config(&[
            (ENABLED_ENV, " Off "),
            (LOG_LEVEL_ENV, "stackwatch_core=debug"),
            (JSON_LOG_PATH_ENV, "logs/stackwatch.jsonl"),
        ])
        .unwrap();
        assert!(!c.enabled);
        assert_eq!(c.filter.as_deref(), Some("stackwatch_core=debug"));
        assert_eq!(c.json_log_path, Some(PathBuf::from("logs/stackwatch.jsonl")));
    }

    #[test]
    fn invalid_flag_is_config_error() {
        let err = config(&[(ENABLED_ENV, "maybe")]).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn invalid_filter_is_config_error() {
        let c = ObservabilityConfig {
            filter: Some("stackwatch_core=loud".into()),
            ..ObservabilityConfig::default()
        };
        assert!(matches!(c.env_filter(), Err(StreamError::Config(_))));
    }

    #[test]
    fn json_log_creates_parent_dir_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stackwatch.jsonl");
        let c = ObservabilityConfig {
            json_log_path: Some(path.clone()),
            ..ObservabilityConfig::default()
        };
        init_with(c.clone()).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(init_with(c).is_ok());
    }
}
