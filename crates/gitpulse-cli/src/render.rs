//! Plain-text presentation of feed events.
//!
//! Read-only: everything here takes `&Event` and returns strings.

use gitpulse_core::{Event, EventKind};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// e.g. `Jan 3, 2024, 09:00 AM`
const ABSOLUTE: &[BorrowedFormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none], [year], [hour repr:12]:[minute] [period]"
);

/// Display bucket. A closed-unmerged pull request gets its own bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Push,
    PullRequest,
    Merge,
    Closed,
    Other,
}

impl Category {
    pub fn of(event: &Event) -> Self {
        if event.is_closed() {
            return Category::Closed;
        }
        match event.kind {
            EventKind::Push => Category::Push,
            EventKind::PullRequest => Category::PullRequest,
            EventKind::Merge => Category::Merge,
            EventKind::Other(_) => Category::Other,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Category::Push => "PUSH  ",
            Category::PullRequest => "PR    ",
            Category::Merge => "MERGE ",
            Category::Closed => "CLOSED",
            Category::Other => "EVENT ",
        }
    }
}

/// When the event happened, or the raw string if it can't be parsed.
pub fn format_absolute(event: &Event) -> String {
    event
        .parsed_timestamp()
        .and_then(|ts| ts.format(ABSOLUTE).ok())
        .unwrap_or_else(|| event.timestamp.clone())
}

pub fn time_ago(event: &Event, now: OffsetDateTime) -> String {
    let Some(then) = event.parsed_timestamp() else {
        return "unknown time".to_string();
    };
    let mins = (now - then).whole_minutes().max(0);
    if mins < 1 {
        return "Just now".to_string();
    }
    if mins < 60 {
        return format!("{mins} min{} ago", plural(mins));
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours} hour{} ago", plural(hours));
    }
    let days = hours / 24;
    format!("{days} day{} ago", plural(days))
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// One-sentence description of the event.
pub fn message(event: &Event) -> String {
    let author = &event.author;
    let from = event.from_branch.as_deref().unwrap_or("");
    let to = event.to_branch.as_deref().unwrap_or("");
    let when = format_absolute(event);
    match &event.kind {
        EventKind::Push => format!("\"{author}\" pushed to \"{to}\" on {when}"),
        EventKind::PullRequest => format!(
            "\"{author}\" submitted a pull request from \"{from}\" to \"{to}\" on {when}"
        ),
        EventKind::Merge => {
            format!("\"{author}\" merged branch \"{from}\" to \"{to}\" on {when}")
        }
        EventKind::Other(kind) => {
            format!("{author} performed an action of type \"{kind}\" on {when}")
        }
    }
}

pub fn line(event: &Event, now: OffsetDateTime) -> String {
    format!(
        "{}  {}  ({})",
        Category::of(event).marker(),
        message(event),
        time_ago(event, now)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-01-03 12:00 UTC);

    #[test]
    fn push_message() {
        let event = Event::new("push", "ann", "2024-01-03T09:05:00Z")
            .with_branches(None, Some("main"));
        assert_eq!(
            message(&event),
            "\"ann\" pushed to \"main\" on Jan 3, 2024, 09:05 AM"
        );
    }

    #[test]
    fn pull_request_and_merge_messages() {
        let pr = Event::new("pull_request", "bob", "2024-01-02T15:30:00Z")
            .with_branches(Some("feat/x"), Some("main"));
        assert_eq!(
            message(&pr),
            "\"bob\" submitted a pull request from \"feat/x\" to \"main\" on Jan 2, 2024, 03:30 PM"
        );

        let merge = Event::new("merge", "cy", "2024-01-02")
            .with_branches(Some("dev"), Some("main"));
        assert!(message(&merge).starts_with("\"cy\" merged branch \"dev\" to \"main\" on "));
    }

    #[test]
    fn other_kind_and_unparsable_time() {
        let event = Event::new("release", "dee", "someday");
        assert_eq!(
            message(&event),
            "dee performed an action of type \"release\" on someday"
        );
        assert_eq!(time_ago(&event, NOW), "unknown time");
    }

    #[test]
    fn closed_pull_request_has_own_category() {
        let closed = Event::new("pull_request", "bob", "2024-01-02").with_action("closed");
        let opened = Event::new("pull_request", "bob", "2024-01-02").with_action("opened");
        assert_eq!(Category::of(&closed), Category::Closed);
        assert_eq!(Category::of(&opened), Category::PullRequest);
    }

    #[test]
    fn relative_times() {
        let at = |ts: &str| Event::new("push", "ann", ts);
        assert_eq!(time_ago(&at("2024-01-03T11:59:30Z"), NOW), "Just now");
        assert_eq!(time_ago(&at("2024-01-03T13:00:00Z"), NOW), "Just now");
        assert_eq!(time_ago(&at("2024-01-03T11:59:00Z"), NOW), "1 min ago");
        assert_eq!(time_ago(&at("2024-01-03T11:15:00Z"), NOW), "45 mins ago");
        assert_eq!(time_ago(&at("2024-01-03T11:00:00Z"), NOW), "1 hour ago");
        assert_eq!(time_ago(&at("2024-01-02T12:00:00Z"), NOW), "1 day ago");
        assert_eq!(time_ago(&at("2023-12-30T12:00:00Z"), NOW), "4 days ago");
    }

    #[test]
    fn line_combines_marker_message_and_age() {
        let event = Event::new("push", "ann", "2024-01-03T10:00:00Z")
            .with_branches(None, Some("main"));
        let rendered = line(&event, NOW);
        assert!(rendered.starts_with("PUSH  "));
        assert!(rendered.ends_with("(2 hours ago)"));
    }
}
