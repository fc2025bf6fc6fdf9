use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use gitpulse_core::Event;
use reqwest::header::ACCEPT;

use crate::config::FeedConfig;
use crate::error::{FetchFailure, Result};

/// Source of event snapshots. Implemented by [`HttpFetcher`] and by
/// [`ScriptedFetcher`] (tests).
#[async_trait::async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Retrieve the collector's current event list, in no particular order.
    async fn fetch_snapshot(&self) -> std::result::Result<Vec<Event>, FetchFailure>;
}

/// Reads the collector's events endpoint with one GET per call.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let url = config.events_url();
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());
        // A collector on this machine is never reached through a proxy.
        if is_loopback(&url) {
            builder = builder.no_proxy();
        }
        Ok(Self {
            client: builder.build()?,
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> FetchFailure {
        if err.is_timeout() {
            FetchFailure::Timeout {
                url: self.url.clone(),
            }
        } else {
            FetchFailure::Transport(err)
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for HttpFetcher {
    async fn fetch_snapshot(&self) -> std::result::Result<Vec<Event>, FetchFailure> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        parse_snapshot(&body)
    }
}

fn is_loopback(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}

/// Decode a response body into events.
pub fn parse_snapshot(body: &[u8]) -> std::result::Result<Vec<Event>, FetchFailure> {
    Ok(serde_json::from_slice(body)?)
}

/// Replays queued responses in order, then empty snapshots (for testing).
///
/// Tracks call count and the peak number of concurrent calls.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<std::result::Result<Vec<Event>, FetchFailure>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then_ok(self, events: Vec<Event>) -> Self {
        self.script.lock().unwrap().push_back(Ok(events));
        self
    }

    pub fn then_err(self, failure: FetchFailure) -> Self {
        self.script.lock().unwrap().push_back(Err(failure));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch_snapshot(&self) -> std::result::Result<Vec<Event>, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
