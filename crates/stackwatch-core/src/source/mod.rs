//! Event source contract: one page of stack events per call, newest first.

mod replay;

pub use replay::ReplaySource;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::event::RawStackEvent;

/// Request for one page of stack events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeStackEventsInput {
    pub stack_name: String,
    /// Cursor from the previous page's output; `None` requests the newest page.
    pub next_token: Option<String>,
}

/// One page of stack events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeStackEventsOutput {
    /// Events in reverse chronological order (newest first).
    pub stack_events: Vec<RawStackEvent>,
    /// Cursor for the next, older page. `None` when there are no more pages.
    pub next_token: Option<String>,
}

/// Capability to describe the events of a stack.
///
/// Implementations must return events newest first within a page, and each
/// following page must be older than the previous one. The streamer's stop
/// conditions rely on this ordering.
#[async_trait]
pub trait StackEventsDescriber: Send + Sync {
    async fn describe_stack_events(
        &self,
        input: DescribeStackEventsInput,
    ) -> Result<DescribeStackEventsOutput, SourceError>;
}
