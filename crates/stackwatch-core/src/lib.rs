//! Streams the events of an in-flight change set to any number of subscribers.
//!
//! A [`StackStreamer`] polls a [`StackEventsDescriber`] for one stack, keeps only events newer
//! than the change set and not seen before, buffers them oldest first, and fans them out to
//! subscriber channels. The caller owns the polling cadence; [`driver::stream`] is a ready-made
//! loop for it.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use stackwatch_core::{ReplaySource, StackStreamer};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), stackwatch_core::StreamError> {
//! let source = Arc::new(ReplaySource::from_json_file("demo", "events.json")?);
//! let mut streamer = StackStreamer::new(source, "demo", Utc::now());
//! let (tx, mut rx) = mpsc::channel(32);
//! streamer.subscribe([tx]);
//!
//! streamer.fetch().await?;
//! streamer.notify().await;
//! streamer.stop();
//! while let Some(event) = rx.recv().await {
//!     println!("{} {}", event.logical_resource_id, event.resource_status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod observability;
pub mod policy;
pub mod source;
pub mod streamer;

pub use config::StreamerConfig;
pub use error::{SourceError, StreamError};
pub use observability::ObservabilityConfig;
pub use event::{RawStackEvent, StackEvent};
pub use policy::RetryPolicy;
pub use source::{
    DescribeStackEventsInput, DescribeStackEventsOutput, ReplaySource, StackEventsDescriber,
};
pub use streamer::{FetchNotifyStopper, StackStreamer};
