//! Merging a fetched snapshot into the held collection.
//!
//! The held collection is ordered most-recent-first and holds each identity
//! (see [`Event::identity_key`]) at most once. A merge never removes or
//! reorders events that are already held.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// How newly discovered events are placed relative to held ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Prepend the new block in snapshot order without resorting.
    ///
    /// If the collector hands back a new event older than the current head,
    /// the collection is no longer strictly descending.
    #[default]
    Prepend,
    /// Prepend, then stable-sort the whole collection by timestamp.
    Resort,
}

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing new; the held collection stands as is.
    Unchanged,
    /// Replacement collection with `added` newly discovered events.
    Updated { events: Vec<Event>, added: usize },
}

impl MergeOutcome {
    pub fn added(&self) -> usize {
        match self {
            MergeOutcome::Unchanged => 0,
            MergeOutcome::Updated { added, .. } => *added,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, MergeOutcome::Unchanged)
    }

    /// Resolve to the resulting collection, cloning `held` when unchanged.
    pub fn into_events(self, held: &[Event]) -> Vec<Event> {
        match self {
            MergeOutcome::Unchanged => held.to_vec(),
            MergeOutcome::Updated { events, .. } => events,
        }
    }
}

/// Stateless merge policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    mode: OrderingMode,
}

impl Reconciler {
    pub fn new(mode: OrderingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OrderingMode {
        self.mode
    }

    pub fn reconcile(&self, held: &[Event], fetched: Vec<Event>) -> MergeOutcome {
        let mut fresh = unseen(held, fetched);
        if fresh.is_empty() {
            return MergeOutcome::Unchanged;
        }
        let added = fresh.len();

        if held.is_empty() {
            sort_descending(&mut fresh);
            return MergeOutcome::Updated {
                events: fresh,
                added,
            };
        }

        let mut events = fresh;
        events.extend_from_slice(held);
        if self.mode == OrderingMode::Resort {
            sort_descending(&mut events);
        }
        MergeOutcome::Updated { events, added }
    }
}

/// Merge `fetched` into `held` with the default [`OrderingMode::Prepend`].
pub fn merge(held: &[Event], fetched: Vec<Event>) -> Vec<Event> {
    Reconciler::default()
        .reconcile(held, fetched)
        .into_events(held)
}

/// Stable descending sort on parsed timestamps; unparsable ones go last.
pub fn sort_descending(events: &mut [Event]) {
    events.sort_by_cached_key(|e| Reverse(e.sort_instant()));
}

/// Fetched events whose identity is neither held nor repeated earlier in the
/// same snapshot, in snapshot order.
fn unseen(held: &[Event], fetched: Vec<Event>) -> Vec<Event> {
    let keep: Vec<bool> = {
        let mut seen: HashSet<&str> = held.iter().map(Event::identity_key).collect();
        fetched
            .iter()
            .map(|e| seen.insert(e.identity_key()))
            .collect()
    };
    fetched
        .into_iter()
        .zip(keep)
        .filter_map(|(event, keep)| keep.then_some(event))
        .collect()
}
