pub mod event;
pub mod reconcile;

pub use event::*;
pub use reconcile::{merge, sort_descending, MergeOutcome, OrderingMode, Reconciler};
