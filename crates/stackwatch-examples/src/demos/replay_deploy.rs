//! Replay deploy: a recorded change set deployment streamed to two subscribers.
//!
//! ```text
//!   [ReplaySource] --> [StackStreamer] --> subscriber "progress"
//!                                      \-> subscriber "audit"
//! ```
//!
//! The replay reveals a few events per poll. Once the whole log is exposed the demo signals
//! `done`, the driver flushes and stops, and both subscribers see their channel close.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stackwatch_core::{
    FetchNotifyStopper, ReplaySource, RetryPolicy, StackEvent, StackStreamer, StreamError,
    StreamerConfig, driver,
};
use tokio::sync::{mpsc, watch};
use tracing::info;

const SAMPLE_EVENTS: &str = include_str!("../../data/sample_events.json");
const SAMPLE_CHANGE_SET_CREATED: &str = "2026-03-01T12:00:00Z";

#[derive(Debug, Clone)]
pub struct ReplayDeployOptions {
    pub stack_name: String,
    /// Event log to replay; the bundled sample when `None`.
    pub events_path: Option<PathBuf>,
    /// Change set creation time; the sample's when `None`.
    pub change_set_created: Option<DateTime<Utc>>,
    pub page_size: usize,
    pub reveal_per_poll: usize,
    pub fetch_interval: Duration,
    pub retry: RetryPolicy,
    /// Print each received event to stdout.
    pub echo: bool,
}

impl Default for ReplayDeployOptions {
    fn default() -> Self {
        Self {
            stack_name: "demo-app-test".to_string(),
            events_path: None,
            change_set_created: None,
            page_size: 3,
            reveal_per_poll: 2,
            fetch_interval: Duration::from_millis(200),
            retry: RetryPolicy::exponential(3, 100, 2.0),
            echo: true,
        }
    }
}

/// Events received by each subscriber, in delivery order.
#[derive(Debug, Default)]
pub struct ReplayDeployReport {
    pub progress: Vec<StackEvent>,
    pub audit: Vec<StackEvent>,
}

fn load_source(opts: &ReplayDeployOptions) -> Result<ReplaySource, StreamError> {
    let source = match &opts.events_path {
        Some(path) => ReplaySource::from_json_file(&opts.stack_name, path)?,
        None => ReplaySource::from_json_str(&opts.stack_name, SAMPLE_EVENTS)?,
    };
    Ok(source
        .page_size(opts.page_size)
        .reveal_per_poll(opts.reveal_per_poll))
}

fn change_set_created(opts: &ReplayDeployOptions) -> Result<DateTime<Utc>, StreamError> {
    match opts.change_set_created {
        Some(t) => Ok(t),
        None => SAMPLE_CHANGE_SET_CREATED
            .parse()
            .map_err(|e| StreamError::Config(format!("invalid sample change set time: {e}"))),
    }
}

fn spawn_subscriber(
    name: &'static str,
    mut rx: mpsc::Receiver<StackEvent>,
    echo: bool,
) -> tokio::task::JoinHandle<Vec<StackEvent>> {
    tokio::spawn(async move {
        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            if echo {
                match event.reason() {
                    Some(reason) => println!(
                        "[{name}] {:<16} {:<28} {:<40} {reason}",
                        event.logical_resource_id, event.resource_type, event.resource_status
                    ),
                    None => println!(
                        "[{name}] {:<16} {:<28} {}",
                        event.logical_resource_id, event.resource_type, event.resource_status
                    ),
                }
            }
            received.push(event);
        }
        received
    })
}

/// Replays the event log through a stack streamer and returns what each subscriber received.
pub async fn run_replay_deploy(
    opts: ReplayDeployOptions,
) -> Result<ReplayDeployReport, StreamError> {
    let source = Arc::new(load_source(&opts)?);
    let config = StreamerConfig::default().fetch_interval(opts.fetch_interval);
    let mut streamer = StackStreamer::with_config(
        source.clone(),
        opts.stack_name.clone(),
        change_set_created(&opts)?,
        config,
    );

    let (progress_tx, progress_rx) = mpsc::channel(8);
    let (audit_tx, audit_rx) = mpsc::channel(8);
    streamer.subscribe([progress_tx, audit_tx]);
    let progress = spawn_subscriber("progress", progress_rx, opts.echo);
    let audit = spawn_subscriber("audit", audit_rx, opts.echo);

    let (done_tx, done_rx) = watch::channel(false);
    let streamers: Vec<Box<dyn FetchNotifyStopper>> = vec![Box::new(streamer)];
    let driver_task = tokio::spawn(driver::stream(done_rx, streamers, opts.retry));

    let mut ticker = tokio::time::interval(opts.fetch_interval);
    while !source.exhausted() && !driver_task.is_finished() {
        ticker.tick().await;
    }
    info!(stack = %opts.stack_name, "event log exhausted; finishing stream");
    let _ = done_tx.send(true);

    driver_task
        .await
        .map_err(|e| StreamError::Config(format!("driver task failed: {e}")))??;
    let progress = progress
        .await
        .map_err(|e| StreamError::Config(format!("subscriber task failed: {e}")))?;
    let audit = audit
        .await
        .map_err(|e| StreamError::Config(format!("subscriber task failed: {e}")))?;
    Ok(ReplayDeployReport { progress, audit })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> ReplayDeployOptions {
        ReplayDeployOptions {
            fetch_interval: Duration::from_millis(5),
            echo: false,
            ..ReplayDeployOptions::default()
        }
    }

    #[tokio::test]
    async fn sample_deploy_reaches_both_subscribers_in_order() {
        let report = run_replay_deploy(quiet()).await.unwrap();
        let statuses: Vec<&str> = report
            .progress
            .iter()
            .map(|e| e.resource_status.as_str())
            .collect();
        assert_eq!(report.progress.len(), 9);
        assert_eq!(statuses.first(), Some(&"UPDATE_IN_PROGRESS"));
        assert_eq!(statuses.last(), Some(&"UPDATE_COMPLETE"));
        assert_eq!(report.progress, report.audit);
    }

    #[tokio::test]
    async fn earlier_deployment_is_not_replayed() {
        let report = run_replay_deploy(quiet()).await.unwrap();
        assert!(report.progress.iter().all(|e| e.resource_status != "CREATE_COMPLETE"));
    }

    #[tokio::test]
    async fn custom_log_file_and_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"[
                {"event_id":"1","logical_resource_id":"Queue","resource_status":"CREATE_IN_PROGRESS","timestamp":"2026-05-01T08:00:01Z"},
                {"event_id":"2","logical_resource_id":"Queue","resource_status":"CREATE_COMPLETE","timestamp":"2026-05-01T08:00:09Z"}
            ]"#,
        )
        .unwrap();
        let opts = ReplayDeployOptions {
            stack_name: "queue-stack".into(),
            events_path: Some(path),
            change_set_created: Some("2026-05-01T08:00:05Z".parse().unwrap()),
            ..quiet()
        };
        let report = run_replay_deploy(opts).await.unwrap();
        assert_eq!(report.audit.len(), 1);
        assert_eq!(report.audit[0].resource_status, "CREATE_COMPLETE");
    }

    #[tokio::test]
    async fn malformed_log_is_replay_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "{ not json").unwrap();
        let opts = ReplayDeployOptions {
            events_path: Some(path),
            ..quiet()
        };
        let err = run_replay_deploy(opts).await.unwrap_err();
        assert!(matches!(err, StreamError::Replay(_)));
    }
}
