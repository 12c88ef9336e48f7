//! Stack event streamer: follows the events a change set produces on one stack.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tracing::{Instrument as _, Span, debug, info, warn};

use super::FetchNotifyStopper;
use crate::config::StreamerConfig;
use crate::error::StreamError;
use crate::event::StackEvent;
use crate::observability::stack_span;
use crate::source::{DescribeStackEventsInput, StackEventsDescriber};

/// Streams the [`StackEvent`]s started by a change set, oldest first, each event at most once.
///
/// Event ids already delivered are remembered for the whole life of the streamer with no
/// eviction. A change set deployment produces a bounded number of events, so this stays small.
pub struct StackStreamer {
    client: Arc<dyn StackEventsDescriber>,
    stack_name: String,
    change_set_creation_time: DateTime<Utc>,
    fetch_interval: Duration,

    subscribers: Vec<mpsc::Sender<StackEvent>>,
    past_event_ids: HashSet<String>,
    events_to_flush: Vec<StackEvent>,
    span: Span,
}

impl StackStreamer {
    /// Creates a streamer for `stack_name`. Events older than `change_set_creation_time` are ignored.
    pub fn new(
        client: Arc<dyn StackEventsDescriber>,
        stack_name: impl Into<String>,
        change_set_creation_time: DateTime<Utc>,
    ) -> Self {
        Self::with_config(
            client,
            stack_name,
            change_set_creation_time,
            StreamerConfig::default(),
        )
    }

    pub fn with_config(
        client: Arc<dyn StackEventsDescriber>,
        stack_name: impl Into<String>,
        change_set_creation_time: DateTime<Utc>,
        config: StreamerConfig,
    ) -> Self {
        let stack_name = stack_name.into();
        Self {
            client,
            span: stack_span(&stack_name),
            stack_name,
            change_set_creation_time,
            fetch_interval: config.fetch_interval,
            subscribers: Vec::new(),
            past_event_ids: HashSet::new(),
            events_to_flush: Vec::new(),
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn change_set_creation_time(&self) -> DateTime<Utc> {
        self.change_set_creation_time
    }

    /// Events fetched but not yet sent to subscribers, oldest first.
    pub fn pending(&self) -> &[StackEvent] {
        &self.events_to_flush
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Registers channels to receive future events.
    ///
    /// The streamer should hold the only sender of each channel: [`StackStreamer::stop`] closes a
    /// channel by dropping its sender, which receivers only observe once every sender is gone.
    pub fn subscribe(&mut self, channels: impl IntoIterator<Item = mpsc::Sender<StackEvent>>) {
        self.subscribers.extend(channels);
    }

    /// Retrieves and buffers the stack events created since the change set, oldest first.
    ///
    /// Pages come back newest first, so paging stops at the first event that is older than the
    /// change set or that an earlier fetch already saw. Returns the time the next fetch should
    /// be attempted. On a source error nothing is buffered, no id is marked seen, and no time is
    /// suggested, so a later fetch picks up the same events again.
    pub async fn fetch(&mut self) -> Result<DateTime<Utc>, StreamError> {
        let mut events = Vec::new();
        let mut new_ids: HashSet<String> = HashSet::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            debug!(stack = %self.stack_name, page = pages, "describing stack events");
            let out = self
                .client
                .describe_stack_events(DescribeStackEventsInput {
                    stack_name: self.stack_name.clone(),
                    next_token: next_token.take(),
                })
                .await
                .map_err(|e| StreamError::describe(&self.stack_name, e))?;
            pages += 1;

            let mut finished = false;
            for raw in &out.stack_events {
                if raw.timestamp < self.change_set_creation_time {
                    finished = true;
                    break;
                }
                if self.past_event_ids.contains(raw.id()) || new_ids.contains(raw.id()) {
                    finished = true;
                    break;
                }
                events.push(StackEvent::from(raw));
                new_ids.insert(raw.id().to_string());
            }
            match out.next_token {
                Some(token) if !finished => next_token = Some(token),
                _ => break,
            }
        }

        events.reverse();
        if !events.is_empty() {
            info!(
                stack = %self.stack_name,
                new_events = events.len(),
                pages,
                "fetched stack events"
            );
        }
        self.past_event_ids.extend(new_ids);
        self.events_to_flush.extend(events);
        Ok(self.next_fetch_time())
    }

    /// Sends every buffered event to every subscriber in registration order, then clears the buffer.
    ///
    /// Each send waits for channel capacity, so a slow subscriber holds back the others and the
    /// caller's next fetch. Subscribers whose receiver was dropped are skipped.
    pub async fn notify(&mut self) {
        if self.events_to_flush.is_empty() {
            return;
        }
        let closed = self.subscribers.iter().filter(|s| s.is_closed()).count();
        if closed > 0 {
            warn!(stack = %self.stack_name, closed, "skipping subscribers with dropped receivers");
        }
        for event in &self.events_to_flush {
            for (index, sub) in self.subscribers.iter().enumerate() {
                if sub.send(event.clone()).await.is_err() {
                    debug!(
                        stack = %self.stack_name,
                        subscriber = index,
                        resource = %event.logical_resource_id,
                        status = %event.resource_status,
                        "subscriber receiver dropped; event skipped"
                    );
                }
            }
        }
        debug!(
            stack = %self.stack_name,
            flushed = self.events_to_flush.len(),
            subscribers = self.subscribers.len(),
            "notified subscribers"
        );
        self.events_to_flush.clear();
    }

    /// Closes all subscribed channels. Events not yet notified are discarded.
    pub fn stop(self) {
        let _entered = self.span.enter();
        info!(
            stack = %self.stack_name,
            subscribers = self.subscribers.len(),
            seen = self.past_event_ids.len(),
            "stopping stack streamer"
        );
    }

    fn next_fetch_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        TimeDelta::from_std(self.fetch_interval)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(now)
    }
}

#[async_trait]
impl FetchNotifyStopper for StackStreamer {
    async fn fetch(&mut self) -> Result<DateTime<Utc>, StreamError> {
        let span = self.span.clone();
        StackStreamer::fetch(self).instrument(span).await
    }

    async fn notify(&mut self) {
        let span = self.span.clone();
        StackStreamer::notify(self).instrument(span).await
    }

    fn stop(self: Box<Self>) {
        StackStreamer::stop(*self)
    }
}
