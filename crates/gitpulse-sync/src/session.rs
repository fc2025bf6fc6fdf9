//! Held feed state for one session.
//!
//! The held collection is published through a `watch` channel: every merge
//! swaps in a whole new `Arc<[Event]>`, so readers never observe a partial
//! update and a render pass can keep its snapshot for as long as it likes.

use std::sync::{Arc, Mutex};

use gitpulse_core::{sort_descending, Event, MergeOutcome, OrderingMode, Reconciler};
use tokio::sync::watch;

use crate::error::FetchFailure;
use crate::fetch::SnapshotFetcher;

/// Counters describing the session so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStatus {
    pub cycles: u64,
    pub failures: u64,
    /// Events added by the most recent successful cycle.
    pub last_added: usize,
    pub last_error: Option<String>,
}

/// What one fetch-and-merge cycle did.
#[derive(Debug)]
pub enum CycleReport {
    Merged { fetched: usize, added: usize },
    Failed(FetchFailure),
}

impl CycleReport {
    pub fn added(&self) -> usize {
        match self {
            CycleReport::Merged { added, .. } => *added,
            CycleReport::Failed(_) => 0,
        }
    }
}

struct Inner {
    events: watch::Sender<Arc<[Event]>>,
    loading: watch::Sender<bool>,
    status: Mutex<FeedStatus>,
    reconciler: Reconciler,
    cycle_lock: tokio::sync::Mutex<()>,
}

/// Cheaply cloneable handle to one feed's state.
#[derive(Clone)]
pub struct FeedSession {
    inner: Arc<Inner>,
}

impl Default for FeedSession {
    fn default() -> Self {
        Self::new(Reconciler::default())
    }
}

impl FeedSession {
    pub fn new(reconciler: Reconciler) -> Self {
        let (events, _) = watch::channel(Arc::<[Event]>::from(Vec::new()));
        let (loading, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                events,
                loading,
                status: Mutex::new(FeedStatus::default()),
                reconciler,
                cycle_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Current held collection, most recent first.
    pub fn snapshot(&self) -> Arc<[Event]> {
        self.inner.events.borrow().clone()
    }

    /// Receiver notified whenever a merge replaces the held collection.
    pub fn subscribe(&self) -> watch::Receiver<Arc<[Event]>> {
        self.inner.events.subscribe()
    }

    pub fn ordering(&self) -> OrderingMode {
        self.inner.reconciler.mode()
    }

    pub fn loading(&self) -> bool {
        *self.inner.loading.borrow()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }

    pub fn status(&self) -> FeedStatus {
        self.lock_status().clone()
    }

    /// Fetch once and merge the result into the held collection.
    ///
    /// Cycles on the same session are serialized; a second caller waits for
    /// the first to finish. A failed fetch leaves the held collection as it
    /// was. `loading` is true for the duration of the call.
    ///
    /// The snapshot is put in newest-first order before merging, so a block of
    /// new events is always internally ordered even when held events are not.
    pub async fn run_cycle(&self, fetcher: &dyn SnapshotFetcher) -> CycleReport {
        let _cycle = self.inner.cycle_lock.lock().await;
        let _loading = LoadingGuard::raise(&self.inner.loading);

        match fetcher.fetch_snapshot().await {
            Ok(mut snapshot) => {
                let fetched = snapshot.len();
                sort_descending(&mut snapshot);
                let held = self.snapshot();
                let outcome = self.inner.reconciler.reconcile(&held, snapshot);
                let added = outcome.added();
                if let MergeOutcome::Updated { events, .. } = outcome {
                    self.inner.events.send_replace(events.into());
                }

                let mut status = self.lock_status();
                status.cycles += 1;
                status.last_added = added;
                drop(status);

                tracing::debug!(fetched, added, "feed cycle merged");
                CycleReport::Merged { fetched, added }
            }
            Err(failure) => {
                let mut status = self.lock_status();
                status.cycles += 1;
                status.failures += 1;
                status.last_error = Some(failure.to_string());
                drop(status);

                tracing::warn!(error = %failure, "snapshot fetch failed; held events kept");
                CycleReport::Failed(failure)
            }
        }
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, FeedStatus> {
        // Status is plain counters; a poisoned lock still holds usable data.
        self.inner
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Raises `loading` on creation and lowers it on drop, so the flag clears
/// even if the cycle future is cancelled mid-fetch.
struct LoadingGuard<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> LoadingGuard<'a> {
    fn raise(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self { flag }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}
