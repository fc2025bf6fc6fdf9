use std::fmt;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Offset-less date-time, minutes required, seconds and fraction optional.
const NAIVE_DATE_TIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
);

/// Same as [`NAIVE_DATE_TIME`] followed by a `+hh:mm` / `-hh:mm` offset.
const OFFSET_DATE_TIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]][offset_hour sign:mandatory]:[offset_minute]"
);

const DATE_ONLY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Display category of an event.
///
/// The collector emits `push`, `pull_request` and `merge`; any other tag is
/// kept verbatim so it can still be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Push,
    PullRequest,
    Merge,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Merge => "merge",
            EventKind::Other(tag) => tag,
        }
    }
}

impl Default for EventKind {
    fn default() -> Self {
        EventKind::Other(String::new())
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "push" => EventKind::Push,
            "pull_request" => EventKind::PullRequest,
            "merge" => EventKind::Merge,
            _ => EventKind::Other(tag),
        }
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        EventKind::from(tag.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One repository activity as served by the collector's read endpoint.
///
/// Any field may be missing on the wire. Missing strings
/// decode as empty, so a malformed record still flows through reconciliation
/// (an empty timestamp is simply unparsable and orders as oldest).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Collector-assigned identifier (`_id` on the wire).
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// ISO-8601 string, kept verbatim. Identity compares the raw text.
    #[serde(default)]
    pub timestamp: String,
}

impl Event {
    pub fn new(kind: impl Into<EventKind>, author: &str, timestamp: &str) -> Self {
        Self {
            kind: kind.into(),
            author: author.to_string(),
            timestamp: timestamp.to_string(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_branches(mut self, from: Option<&str>, to: Option<&str>) -> Self {
        self.from_branch = from.map(str::to_string);
        self.to_branch = to.map(str::to_string);
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    /// Set-membership key: the id when present and non-empty, otherwise the
    /// raw timestamp string.
    ///
    /// Two id-less events sharing a timestamp collapse into one identity.
    pub fn identity_key(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.timestamp,
        }
    }

    /// A pull request that was closed without being merged.
    pub fn is_closed(&self) -> bool {
        self.kind == EventKind::PullRequest && self.action.as_deref() == Some("closed")
    }

    pub fn parsed_timestamp(&self) -> Option<OffsetDateTime> {
        parse_timestamp(&self.timestamp)
    }

    /// Instant used for ordering. Unparsable timestamps sort as the epoch.
    pub fn sort_instant(&self) -> OffsetDateTime {
        self.parsed_timestamp().unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

/// Free-function form of [`Event::identity_key`].
pub fn identity_key(event: &Event) -> &str {
    event.identity_key()
}

/// True when `a` happened strictly after `b`.
pub fn is_newer(a: &Event, b: &Event) -> bool {
    a.sort_instant() > b.sort_instant()
}

/// Parse the timestamp shapes the collector is known to emit.
///
/// Accepts RFC 3339, offset-less date-times (taken as UTC, optionally with a
/// trailing `Z`), date-times with a `±hh:mm` offset but no seconds, and bare
/// dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    let naive = raw
        .strip_suffix('Z')
        .or_else(|| raw.strip_suffix('z'))
        .unwrap_or(raw);
    if let Ok(ts) = PrimitiveDateTime::parse(naive, NAIVE_DATE_TIME) {
        return Some(ts.assume_offset(UtcOffset::UTC));
    }
    if let Ok(ts) = OffsetDateTime::parse(raw, OFFSET_DATE_TIME) {
        return Some(ts);
    }
    Date::parse(raw, DATE_ONLY)
        .ok()
        .map(|d| d.midnight().assume_utc())
}
