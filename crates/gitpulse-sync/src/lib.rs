//! Polling side of the gitpulse feed.
//!
//! A [`Scheduler`] owns one [`FeedSession`] and drives fetch-and-merge
//! cycles against a [`SnapshotFetcher`]:
//!
//! ```text
//!  Scheduler ──tick──▶ SnapshotFetcher ──snapshot──▶ Reconciler
//!                                                       │
//!                                                       ▼
//!                          readers ◀── watch ── FeedSession (held events, loading)
//! ```
//!
//! A failed fetch is logged and counted, never merged; the next tick is the
//! retry.

pub mod config;
pub mod error;
pub mod fetch;
pub mod scheduler;
pub mod session;

pub use config::FeedConfig;
pub use error::{Error, FetchFailure, Result};
pub use fetch::{parse_snapshot, HttpFetcher, ScriptedFetcher, SnapshotFetcher};
pub use scheduler::{Scheduler, SchedulerState, DEFAULT_POLL_INTERVAL};
pub use session::{CycleReport, FeedSession, FeedStatus};
