//! Replay a recorded change set deployment through a stack streamer.

mod demos;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use stackwatch_core::{RetryPolicy, StreamerConfig, observability};

use crate::demos::{ReplayDeployOptions, run_replay_deploy};

#[derive(Debug, Parser)]
#[command(name = "stackwatch-examples", about = "Stream stack events of a replayed change set")]
struct Cli {
    /// Stack name the replayed events belong to.
    #[arg(long, default_value = "demo-app-test")]
    stack: String,
    /// JSON array of raw stack events. Uses the bundled sample when omitted.
    #[arg(long)]
    events: Option<PathBuf>,
    /// Change set creation time (RFC 3339). Events before it are ignored.
    #[arg(long)]
    change_set_created: Option<DateTime<Utc>>,
    /// Events per page returned by the replay source.
    #[arg(long, default_value_t = 3)]
    page_size: usize,
    /// Events the replay reveals on each poll.
    #[arg(long, default_value_t = 2)]
    reveal: usize,
    /// Fetch interval in milliseconds. Defaults to STACKWATCH_FETCH_INTERVAL_MS, then 3000.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Consecutive fetch failures tolerated before giving up.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    observability::init_observability()?;
    let cli = Cli::parse();

    let fetch_interval = match cli.interval_ms {
        Some(ms) => Duration::from_millis(ms.max(1)),
        None => StreamerConfig::from_env()?.fetch_interval,
    };
    let opts = ReplayDeployOptions {
        stack_name: cli.stack,
        events_path: cli.events,
        change_set_created: cli.change_set_created,
        page_size: cli.page_size,
        reveal_per_poll: cli.reveal,
        fetch_interval,
        retry: RetryPolicy::exponential(cli.max_retries, 250, 2.0),
        echo: true,
    };

    println!("=== Replay deploy ({}) ===\n", opts.stack_name);
    let report = run_replay_deploy(opts).await?;
    println!(
        "\nprogress received {} events, audit received {} events",
        report.progress.len(),
        report.audit.len()
    );
    Ok(())
}
