use gitpulse_core::{Event, Reconciler};
use gitpulse_sync::{CycleReport, FeedConfig, FeedSession, HttpFetcher};
use time::OffsetDateTime;

use crate::render;

pub struct SnapshotParams {
    pub config: FeedConfig,
    pub limit: usize,
    pub json: bool,
}

/// Fetch once, order the result, print it, exit.
pub async fn execute(params: SnapshotParams) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(&params.config)?;
    let session = FeedSession::new(Reconciler::new(params.config.ordering));
    tracing::debug!(url = fetcher.url(), "fetching one snapshot");

    if let CycleReport::Failed(failure) = session.run_cycle(&fetcher).await {
        anyhow::bail!("failed to fetch {}: {failure}", fetcher.url());
    }

    let held = session.snapshot();
    let mut shown: Vec<&Event> = held.iter().collect();
    if params.limit > 0 {
        shown.truncate(params.limit);
    }

    if shown.is_empty() {
        println!("No events yet.");
        return Ok(());
    }

    if params.json {
        for e in &shown {
            println!("{}", serde_json::to_string(e)?);
        }
    } else {
        let now = OffsetDateTime::now_utc();
        for e in &shown {
            println!("{}", render::line(e, now));
        }
        println!("\n({} of {} events shown)", shown.len(), held.len());
    }

    Ok(())
}
