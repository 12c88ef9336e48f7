//! # Streamers
//!
//! A streamer polls a source for new events ([`FetchNotifyStopper::fetch`]), buffers them, and
//! pushes the buffer to its subscribers ([`FetchNotifyStopper::notify`]). When the caller decides
//! the operation is over it calls [`FetchNotifyStopper::stop`], which closes every subscriber.
//!
//! ## Driving contract
//!
//! Streamers hold no lock. One control loop owns a streamer and alternates `fetch` and `notify`;
//! consumers read from their own channel receivers concurrently. `fetch` returns the earliest
//! time the next `fetch` should happen. [`crate::driver::stream`] is one such loop.
//!
//! ## Stop
//!
//! `stop` consumes the streamer, so a second stop or any use after stop does not compile.

mod stack;

pub use stack::StackStreamer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StreamError;

/// Anything the driver can poll, flush and close.
#[async_trait]
pub trait FetchNotifyStopper: Send {
    /// Pulls new events into the pending buffer and returns when to fetch next.
    async fn fetch(&mut self) -> Result<DateTime<Utc>, StreamError>;

    /// Sends every pending event to every subscriber, then clears the buffer.
    async fn notify(&mut self);

    /// Closes every subscriber channel.
    fn stop(self: Box<Self>);
}
