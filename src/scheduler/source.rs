use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One polled endpoint and its reload cadence.
///
/// The interval is clamped to [`FetchSource::MIN_RELOAD_INTERVAL`] at
/// construction and may only shrink afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSource {
    url: String,
    reload_interval: Duration,
}

impl FetchSource {
    pub const MIN_RELOAD_INTERVAL: Duration = Duration::from_millis(1000);

    pub fn new(url: impl Into<String>, reload_interval: Duration) -> Self {
        Self {
            url: url.into(),
            reload_interval: reload_interval.max(Self::MIN_RELOAD_INTERVAL),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn reload_interval(&self) -> Duration {
        self.reload_interval
    }

    /// Speeds up polling: applies `candidate` only when it lies strictly
    /// between the floor and the current interval. Returns whether it applied.
    pub fn set_reload_interval(&mut self, candidate: Duration) -> bool {
        if candidate > Self::MIN_RELOAD_INTERVAL && candidate < self.reload_interval {
            self.reload_interval = candidate;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CycleState {
    #[default]
    Idle,
    Fetching,
    Scheduled,
}

/// Diagnostics published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchStatus {
    pub state: CycleState,
    pub reload_interval: Duration,
    /// Completed cycles, whatever their outcome.
    pub cycles: u64,
    /// Items in the cache after the last successful cycle.
    pub items: usize,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// True when the last successful cycle served the fallback payload.
    pub served_fallback: bool,
}

impl FetchStatus {
    pub(crate) fn new(reload_interval: Duration) -> Self {
        Self {
            state: CycleState::Idle,
            reload_interval,
            cycles: 0,
            items: 0,
            last_success: None,
            last_error: None,
            served_fallback: false,
        }
    }
}
