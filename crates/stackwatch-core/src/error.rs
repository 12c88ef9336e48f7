/// Errors returned by an event source adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network or connection failure before a response was received.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with an application-level failure (auth, validation, missing stack).
    #[error("service error ({code}): {message}")]
    Service { code: String, message: String },
    /// The service rejected the request because of rate limiting.
    #[error("throttled: {0}")]
    Throttled(String),
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled(message.into())
    }

    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

/// Top-level error type for streamers and the driver loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The event source failed; recoverable by calling fetch again later.
    #[error("describe stack events {stack_name}: {source}")]
    DescribeStackEvents {
        stack_name: String,
        #[source]
        source: SourceError,
    },
    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),
    /// A recorded event log could not be loaded.
    #[error("replay error: {0}")]
    Replay(String),
    /// Logging could not be initialized (log directory or global subscriber).
    #[error("observability error: {0}")]
    Observability(String),
}

impl StreamError {
    pub(crate) fn describe(stack_name: &str, source: SourceError) -> Self {
        Self::DescribeStackEvents {
            stack_name: stack_name.to_string(),
            source,
        }
    }

    /// True when the error came from the event source and a later fetch may succeed.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::DescribeStackEvents { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_error_is_wrapped_with_stack_name() {
        let err = StreamError::describe("phonetool-test", SourceError::transport("connection reset"));
        assert_eq!(
            err.to_string(),
            "describe stack events phonetool-test: transport error: connection reset"
        );
        assert!(err.is_source_unavailable());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn config_error_is_not_source_unavailable() {
        assert!(!StreamError::Config("bad".into()).is_source_unavailable());
        assert!(SourceError::throttled("Rate exceeded").is_throttling());
    }
}
