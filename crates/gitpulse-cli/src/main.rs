mod cmd_snapshot;
mod cmd_watch;
mod render;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gitpulse_core::OrderingMode;
use gitpulse_sync::FeedConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gitpulse",
    version,
    about = "Live activity feed for repository webhook events"
)]
struct Cli {
    #[command(flatten)]
    feed: FeedArgs,
    #[command(subcommand)]
    cmd: Command,
}

/// Options shared by every subcommand.
#[derive(Args)]
struct FeedArgs {
    /// JSON config file (keys: base_url, events_path, poll_interval_secs,
    /// request_timeout_secs, ordering)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Collector base URL (e.g. http://localhost:5000)
    #[arg(long, env = "GITPULSE_API_URL", global = true)]
    url: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Resort the whole feed by timestamp after each merge
    #[arg(long, global = true)]
    resort: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the collector and print new events as they arrive
    Watch {
        /// Seconds between polls (default: 15)
        #[arg(long)]
        interval: Option<u64>,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Fetch the current event list once and print it
    Snapshot {
        /// Maximum number of events to show (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
}

impl FeedArgs {
    /// Config file (or defaults), then flags and environment on top.
    fn resolve(&self, interval: Option<u64>) -> anyhow::Result<FeedConfig> {
        let mut config = FeedConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if let Some(interval) = interval {
            config.poll_interval_secs = interval;
        }
        if self.resort {
            config.ordering = OrderingMode::Resort;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gitpulse=info,gitpulse_sync=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.cmd {
        Command::Watch { interval, json } => {
            let config = cli.feed.resolve(interval)?;
            cmd_watch::execute(config, json).await
        }
        Command::Snapshot { limit, json } => {
            let config = cli.feed.resolve(None)?;
            cmd_snapshot::execute(cmd_snapshot::SnapshotParams {
                config,
                limit,
                json,
            })
            .await
        }
    }
}
