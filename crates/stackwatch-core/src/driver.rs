//! Caller-side control loop: alternates fetch and notify on the streamers' suggested cadence
//! until told to finish, then flushes one last time and stops every streamer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::policy::RetryPolicy;
use crate::streamer::FetchNotifyStopper;

/// Drives `streamers` until `done` turns `true` (or its sender is dropped).
///
/// The next round of fetches waits for the latest time any streamer suggested. Every streamer
/// is fetched and notified each round even when another one fails. A round with any source
/// error counts as one failure; `policy` bounds consecutive failed rounds across all streamers,
/// not per streamer. When the policy is exhausted, or on any other error,
/// every streamer is stopped and the error is returned. On `done`, each streamer gets a final
/// fetch and notify before it is stopped.
pub async fn stream(
    mut done: watch::Receiver<bool>,
    mut streamers: Vec<Box<dyn FetchNotifyStopper>>,
    policy: RetryPolicy,
) -> Result<(), StreamError> {
    let mut delay = Duration::ZERO;
    let mut retries = 0u32;
    loop {
        tokio::select! {
            biased;
            _ = async { let _ = done.wait_for(|finished| *finished).await; } => {
                info!(streamers = streamers.len(), "stream done; flushing remaining events");
                for streamer in streamers.iter_mut() {
                    if let Err(err) = streamer.fetch().await {
                        warn!(error = %err, "final fetch failed");
                    }
                    streamer.notify().await;
                }
                stop_all(streamers);
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let fetched = fetch_all(&mut streamers).await;
        for streamer in streamers.iter_mut() {
            streamer.notify().await;
        }
        match fetched {
            Ok(next) => {
                retries = 0;
                delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            }
            Err(err) => match policy
                .retry_delay(retries + 1)
                .filter(|_| err.is_source_unavailable())
            {
                Some(wait) => {
                    retries += 1;
                    delay = wait;
                    warn!(error = %err, retry = retries, backoff_ms = delay.as_millis() as u64, "fetch failed; retrying");
                }
                None => {
                    warn!(error = %err, retries, "fetch failed; stopping streamers");
                    stop_all(streamers);
                    return Err(err);
                }
            },
        }
    }
}

/// Fetches every streamer, even after one fails, so a flaky source does not hold back the
/// others. Returns the latest suggested next-fetch time, or the first error of the round.
async fn fetch_all(
    streamers: &mut [Box<dyn FetchNotifyStopper>],
) -> Result<DateTime<Utc>, StreamError> {
    let mut latest = Utc::now();
    let mut first_err = None;
    for (index, streamer) in streamers.iter_mut().enumerate() {
        match streamer.fetch().await {
            Ok(next) => latest = latest.max(next),
            Err(err) => {
                debug!(streamer = index, error = %err, "streamer fetch failed");
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(latest),
    }
}

fn stop_all(streamers: Vec<Box<dyn FetchNotifyStopper>>) {
    for streamer in streamers {
        streamer.stop();
    }
}
