use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gitpulse_core::Reconciler;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{FeedConfig, DEFAULT_POLL_INTERVAL_SECS};
use crate::error::{Error, Result};
use crate::fetch::{HttpFetcher, SnapshotFetcher};
use crate::session::FeedSession;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);

/// Lifecycle of a [`Scheduler`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Drives fetch-and-merge cycles on a fixed interval.
///
/// The polling task runs one cycle immediately on [`start`](Self::start) and
/// then once per interval. Cycles run back to back inside that task, so they
/// never overlap; a cycle that outlasts the interval delays the next tick
/// instead of queueing a burst.
pub struct Scheduler {
    session: FeedSession,
    fetcher: Arc<dyn SnapshotFetcher>,
    interval: Duration,
    state: SchedulerState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>, session: FeedSession) -> Self {
        Self {
            session,
            fetcher,
            interval: DEFAULT_POLL_INTERVAL,
            state: SchedulerState::Idle,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// HTTP-backed scheduler with a fresh session, both built from `config`.
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config)?;
        let session = FeedSession::new(Reconciler::new(config.ordering));
        Ok(Self::new(Arc::new(fetcher), session).with_interval(config.poll_interval()))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn session(&self) -> &FeedSession {
        &self.session
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Idle → Running. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SchedulerState::Idle {
            return Err(Error::InvalidTransition {
                action: "start",
                state: self.state,
            });
        }
        if self.interval.is_zero() {
            return Err(Error::Config("poll interval must be > 0".into()));
        }

        let task = tokio::spawn(poll_loop(
            self.session.clone(),
            Arc::clone(&self.fetcher),
            self.interval,
            self.cancel.clone(),
        ));
        self.task = Some(task);
        self.state = SchedulerState::Running;
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            ordering = ?self.session.ordering(),
            "feed polling started"
        );
        Ok(())
    }

    /// Disarm the timer. Idempotent.
    ///
    /// A fetch already in flight is allowed to finish and merge.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        self.cancel.cancel();
        if self.state == SchedulerState::Running {
            tracing::info!("feed polling stopped");
        }
        self.state = SchedulerState::Stopped;
    }

    /// Wait for the polling task to exit. Returns at once if it never started.
    pub async fn join(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "feed polling task ended abnormally");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    session: FeedSession,
    fetcher: Arc<dyn SnapshotFetcher>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                session.run_cycle(fetcher.as_ref()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use gitpulse_core::{Event, OrderingMode};

    use super::*;
    use crate::error::FetchFailure;
    use crate::fetch::ScriptedFetcher;

    const TICK: Duration = Duration::from_secs(15);

    fn keyed(id: &str, ts: &str) -> Event {
        Event::new("push", "ann", ts).with_id(id)
    }

    fn scheduler_with(fetcher: &Arc<ScriptedFetcher>) -> Scheduler {
        let fetcher: Arc<dyn SnapshotFetcher> = fetcher.clone();
        Scheduler::new(fetcher, FeedSession::default()).with_interval(TICK)
    }

    /// Let the polling task run everything due at the current instant.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_fetches_immediately_then_every_interval() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut scheduler = scheduler_with(&fetcher);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.start().unwrap();
        settle().await;
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Running);

        tokio::time::sleep(TICK).await;
        assert_eq!(fetcher.calls(), 2);

        tokio::time::sleep(TICK * 2).await;
        assert_eq!(fetcher.calls(), 4);

        scheduler.stop();
        scheduler.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_fetches() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut scheduler = scheduler_with(&fetcher);

        scheduler.start().unwrap();
        settle().await;
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        tokio::time::sleep(TICK * 5).await;
        assert_eq!(fetcher.calls(), 1);

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        scheduler.join().await;
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_state_and_keeps_running() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .then_ok(vec![keyed("a", "2024-01-01T00:00:00Z")])
                .then_err(FetchFailure::Status { status: 500 })
                .then_ok(vec![
                    keyed("b", "2024-01-02T00:00:00Z"),
                    keyed("a", "2024-01-01T00:00:00Z"),
                ]),
        );
        let mut scheduler = scheduler_with(&fetcher);
        scheduler.start().unwrap();
        settle().await;
        let before = scheduler.session().snapshot();
        assert_eq!(before.len(), 1);

        tokio::time::sleep(TICK).await;
        assert_eq!(fetcher.calls(), 2);
        assert!(Arc::ptr_eq(&before, &scheduler.session().snapshot()));
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(!scheduler.session().loading());
        assert_eq!(scheduler.session().status().failures, 1);

        tokio::time::sleep(TICK).await;
        let held = scheduler.session().snapshot();
        assert_eq!(held.len(), 2);
        assert_eq!(held[0].identity_key(), "b");

        scheduler.stop();
        scheduler.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_never_overlaps() {
        let fetcher = Arc::new(ScriptedFetcher::new().with_delay(TICK * 3));
        let mut scheduler = scheduler_with(&fetcher);
        scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_secs(200)).await;
        scheduler.stop();
        scheduler.join().await;

        assert!(fetcher.calls() >= 2);
        assert_eq!(fetcher.peak_in_flight(), 1);
        assert!(!scheduler.session().loading());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_fetch_still_merges_after_stop() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_delay(Duration::from_secs(5))
                .then_ok(vec![keyed("a", "2024-01-01T00:00:00Z")]),
        );
        let mut scheduler = scheduler_with(&fetcher);
        scheduler.start().unwrap();
        settle().await;
        assert!(scheduler.session().loading());

        scheduler.stop();
        scheduler.join().await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(scheduler.session().snapshot().len(), 1);
        assert!(!scheduler.session().loading());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_is_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut scheduler = scheduler_with(&fetcher);
        scheduler.start().unwrap();
        assert!(matches!(
            scheduler.start(),
            Err(Error::InvalidTransition {
                action: "start",
                state: SchedulerState::Running
            })
        ));

        scheduler.stop();
        let err = scheduler.start().unwrap_err();
        assert_eq!(err.to_string(), "cannot start a scheduler that is stopped");
        scheduler.join().await;
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut scheduler = scheduler_with(&fetcher).with_interval(Duration::ZERO);
        assert!(matches!(scheduler.start(), Err(Error::Config(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn stop_before_start_is_harmless() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut scheduler = scheduler_with(&fetcher);
        scheduler.stop();
        scheduler.stop();
        scheduler.join().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn from_config_rejects_invalid_config() {
        let config = FeedConfig {
            base_url: String::new(),
            ..FeedConfig::default()
        };
        assert!(matches!(
            Scheduler::from_config(&config),
            Err(Error::Config(_))
        ));

        let scheduler = Scheduler::from_config(&FeedConfig::default()).unwrap();
        assert_eq!(scheduler.interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(scheduler.session().ordering(), OrderingMode::Prepend);

        let config = FeedConfig {
            ordering: OrderingMode::Resort,
            ..FeedConfig::default()
        };
        let scheduler = Scheduler::from_config(&config).unwrap();
        assert_eq!(scheduler.session().ordering(), OrderingMode::Resort);
    }
}
