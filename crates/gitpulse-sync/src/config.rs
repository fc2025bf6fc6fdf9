use std::path::Path;
use std::time::Duration;

use gitpulse_core::OrderingMode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default collector address (the Flask receiver's development port).
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Read endpoint, relative to the base URL.
pub const DEFAULT_EVENTS_PATH: &str = "/webhook/events";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Feed configuration, stored as JSON with every key optional.
///
/// ```json
/// { "base_url": "https://hooks.example.com", "poll_interval_secs": 30, "ordering": "resort" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub events_path: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub ordering: OrderingMode,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            events_path: DEFAULT_EVENTS_PATH.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            ordering: OrderingMode::default(),
        }
    }
}

impl FeedConfig {
    /// Defaults, overlaid with the JSON file at `path` when one is given.
    ///
    /// An explicitly named file that is missing or malformed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("base_url is empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https:// (got {url:?})"
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Full URL of the read endpoint.
    pub fn events_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = self.events_path.trim().trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
