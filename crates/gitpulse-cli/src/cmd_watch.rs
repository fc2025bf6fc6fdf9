use std::collections::HashSet;

use gitpulse_core::Event;
use gitpulse_sync::{FeedConfig, Scheduler};
use time::OffsetDateTime;

use crate::render;

/// Launch the live feed. Prints the first snapshot, then every newly
/// discovered event as it arrives, until Ctrl-C.
pub async fn execute(config: FeedConfig, json: bool) -> anyhow::Result<()> {
    let mut scheduler = Scheduler::from_config(&config)?;
    let session = scheduler.session().clone();
    let mut updates = session.subscribe();
    let mut loading = session.watch_loading();

    eprintln!(
        "gitpulse watch: polling {} every {}s",
        config.events_url(),
        config.poll_interval_secs
    );
    eprintln!("Press Ctrl-C to stop.\n");

    scheduler.start()?;

    let mut printer = FeedPrinter::new(json);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let held = updates.borrow_and_update().clone();
                printer.print_new(&held)?;
            }
            changed = loading.changed() => {
                if changed.is_err() {
                    break;
                }
                let busy = *loading.borrow_and_update();
                tracing::debug!(busy, "feed loading");
                if !busy && printer.announce_empty(&session.snapshot()) {
                    eprintln!("No events yet.");
                }
            }
        }
    }

    scheduler.stop();
    scheduler.join().await;

    let status = session.status();
    eprintln!(
        "\nStopped after {} cycles ({} failed), {} events held.",
        status.cycles,
        status.failures,
        session.snapshot().len()
    );
    Ok(())
}

/// Prints each identity at most once across updates.
struct FeedPrinter {
    printed: HashSet<String>,
    json: bool,
    announced_empty: bool,
}

impl FeedPrinter {
    fn new(json: bool) -> Self {
        Self {
            printed: HashSet::new(),
            json,
            announced_empty: false,
        }
    }

    /// True once, the first time a finished cycle leaves the feed empty.
    fn announce_empty(&mut self, held: &[Event]) -> bool {
        if self.announced_empty || !held.is_empty() || !self.printed.is_empty() {
            return false;
        }
        self.announced_empty = true;
        true
    }

    fn print_new(&mut self, held: &[Event]) -> anyhow::Result<()> {
        let now = OffsetDateTime::now_utc();
        for event in self.take_unprinted(held) {
            if self.json {
                println!("{}", serde_json::to_string(event)?);
            } else {
                println!("{}", render::line(event, now));
            }
        }
        Ok(())
    }

    fn take_unprinted<'a>(&mut self, held: &'a [Event]) -> Vec<&'a Event> {
        held.iter()
            .filter(|e| self.printed.insert(e.identity_key().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_emits_each_identity_once() {
        let mut printer = FeedPrinter::new(true);
        let first = vec![
            Event::new("push", "ann", "2024-01-02T00:00:00Z").with_id("b"),
            Event::new("push", "ann", "2024-01-01T00:00:00Z").with_id("a"),
        ];
        assert_eq!(printer.take_unprinted(&first).len(), 2);

        let mut second = vec![Event::new("merge", "bob", "2024-01-03T00:00:00Z").with_id("c")];
        second.extend(first);
        let fresh = printer.take_unprinted(&second);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].identity_key(), "c");
        assert!(printer.take_unprinted(&second).is_empty());
    }

    #[test]
    fn empty_feed_is_announced_once() {
        let mut printer = FeedPrinter::new(false);
        assert!(printer.announce_empty(&[]));
        assert!(!printer.announce_empty(&[]));
    }

    #[test]
    fn non_empty_feed_is_never_announced_empty() {
        let mut printer = FeedPrinter::new(false);
        let held = vec![Event::new("push", "ann", "2024-01-02T00:00:00Z").with_id("a")];
        assert!(!printer.announce_empty(&held));

        printer.take_unprinted(&held);
        assert!(!printer.announce_empty(&[]));
    }
}
