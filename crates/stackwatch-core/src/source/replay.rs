//! In-memory event source that serves a recorded event log.
//!
//! The log is kept in chronological order and served newest first, `page_size` events per
//! page. With [`ReplaySource::reveal_per_poll`], each request for the newest page exposes a few
//! more events of the log, so repeated fetches observe the stack making progress.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{DescribeStackEventsInput, DescribeStackEventsOutput, StackEventsDescriber};
use crate::error::{SourceError, StreamError};
use crate::event::RawStackEvent;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default)]
struct ReplayState {
    revealed: usize,
    requests: usize,
    failures: VecDeque<SourceError>,
    scheduled: BTreeMap<usize, SourceError>,
}

/// Replays a recorded stack event log through the [`StackEventsDescriber`] contract.
#[derive(Debug)]
pub struct ReplaySource {
    stack_name: String,
    events: Vec<RawStackEvent>,
    page_size: usize,
    reveal_step: Option<usize>,
    state: Mutex<ReplayState>,
}

impl ReplaySource {
    /// Creates a source for `stack_name`. Events are sorted oldest first; ties keep their order.
    pub fn new(stack_name: impl Into<String>, mut events: Vec<RawStackEvent>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self {
            stack_name: stack_name.into(),
            events,
            page_size: DEFAULT_PAGE_SIZE,
            reveal_step: None,
            state: Mutex::new(ReplayState::default()),
        }
    }

    /// Parses a JSON array of raw events.
    pub fn from_json_str(stack_name: impl Into<String>, json: &str) -> Result<Self, StreamError> {
        let events: Vec<RawStackEvent> = serde_json::from_str(json)
            .map_err(|e| StreamError::Replay(format!("invalid event log: {e}")))?;
        Ok(Self::new(stack_name, events))
    }

    /// Reads a JSON array of raw events from `path`.
    pub fn from_json_file(
        stack_name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StreamError::Replay(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(stack_name, &json)
    }

    /// Events per page. Clamped to at least 1.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Expose `step` more events on every request for the newest page instead of the whole log.
    pub fn reveal_per_poll(mut self, step: usize) -> Self {
        self.reveal_step = Some(step.max(1));
        self
    }

    /// Queue an error to be returned by the next request, ahead of any page.
    pub fn fail_next(&self, error: SourceError) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.push_back(error);
        }
    }

    /// Fail the `request`-th describe call (1-based, counting every call including failures).
    pub fn fail_on_request(&self, request: usize, error: SourceError) {
        if let Ok(mut state) = self.state.lock() {
            state.scheduled.insert(request, error);
        }
    }

    /// Number of describe calls served so far, failures included.
    pub fn requests(&self) -> usize {
        self.state.lock().map(|s| s.requests).unwrap_or_default()
    }

    /// True once every event of the log has been exposed.
    pub fn exhausted(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.revealed >= self.events.len())
            .unwrap_or(true)
    }
}

#[async_trait]
impl StackEventsDescriber for ReplaySource {
    async fn describe_stack_events(
        &self,
        input: DescribeStackEventsInput,
    ) -> Result<DescribeStackEventsOutput, SourceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SourceError::transport("replay state lock poisoned"))?;
        state.requests += 1;
        let request = state.requests;
        if let Some(err) = state.scheduled.remove(&request) {
            return Err(err);
        }
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        if input.stack_name != self.stack_name {
            return Err(SourceError::service(
                "ValidationError",
                format!("Stack with id {} does not exist", input.stack_name),
            ));
        }

        let offset = match input.next_token.as_deref() {
            None => {
                state.revealed = match self.reveal_step {
                    Some(step) => (state.revealed + step).min(self.events.len()),
                    None => self.events.len(),
                };
                0
            }
            Some(token) => token.parse::<usize>().map_err(|_| {
                SourceError::service("ValidationError", format!("invalid next token {token:?}"))
            })?,
        };

        let revealed = state.revealed;
        let end = (offset + self.page_size).min(revealed);
        let stack_events: Vec<RawStackEvent> = self.events[..revealed]
            .iter()
            .rev()
            .skip(offset)
            .take(end.saturating_sub(offset))
            .cloned()
            .collect();
        let next_token = (end < revealed).then(|| end.to_string());
        debug!(
            stack = %self.stack_name,
            offset,
            returned = stack_events.len(),
            revealed,
            "served replay page"
        );
        Ok(DescribeStackEventsOutput {
            stack_events,
            next_token,
        })
    }
}
