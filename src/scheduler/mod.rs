//! Per-source polling state machine.
//!
//! Each [`Fetcher`] owns one background task (the poller) that runs the
//! fetch → normalize → notify → rearm cycle for a single [`FetchSource`].
//!
//! # Cycle
//!
//! ```text
//! Idle ──start_fetch──► Fetching ──outcome handled──► Scheduled
//!                          ▲                              │
//!                          └──── timer / start_fetch ─────┘
//! ```
//!
//! The poller handles one command or timer tick at a time and runs each
//! cycle to completion before looking at the next, so cycles for a source
//! never overlap. The pending timer is a single optional deadline: arming
//! replaces it and `start_fetch` clears it, so at most one is ever pending.

mod hub;
mod source;

pub use hub::{FeedView, FetchFailedFn, ItemsReceivedFn, SubscriptionHub};
pub use source::{CycleState, FetchSource, FetchStatus};

use crate::feed::{normalize, DisplayItem, FeedPayload};
use crate::fetch::{attempt_fetch, FetchError, FetchOutcome, Transport, TransportError};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Poller for {0} has stopped")]
    Stopped(String),
}

enum Command {
    StartFetch,
    Shutdown,
}

/// State shared between a [`Fetcher`] handle and its poller task.
struct Shared {
    source: Mutex<FetchSource>,
    hub: SubscriptionHub,
    status: watch::Sender<FetchStatus>,
}

impl Shared {
    fn source(&self) -> MutexGuard<'_, FetchSource> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reload_interval(&self) -> Duration {
        self.source().reload_interval()
    }
}

/// Handle to a running poller for one source.
///
/// Dropping every handle stops the poller after its current cycle.
pub struct Fetcher {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl Fetcher {
    /// Spawns the poller on the current tokio runtime. It stays `Idle`
    /// until the first [`start_fetch`](Self::start_fetch).
    ///
    /// `fallback` is served in place of live data whenever the endpoint
    /// refuses the connection.
    pub fn spawn(
        source: FetchSource,
        transport: Arc<dyn Transport>,
        fallback: Option<FeedPayload>,
    ) -> Self {
        let (status, _) = watch::channel(FetchStatus::new(source.reload_interval()));
        let shared = Arc::new(Shared {
            hub: SubscriptionHub::new(source.url()),
            source: Mutex::new(source),
            status,
        });
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);

        let poller = Poller {
            shared: Arc::clone(&shared),
            transport,
            fallback,
            commands: rx,
            next_tick: None,
        };
        let task = tokio::spawn(poller.run());

        Self {
            shared,
            commands,
            task,
        }
    }

    /// Requests a cycle now, cancelling any pending timer.
    ///
    /// A cycle already in flight finishes first; requests queue behind it.
    pub async fn start_fetch(&self) -> Result<(), SchedulerError> {
        self.commands
            .send(Command::StartFetch)
            .await
            .map_err(|_| SchedulerError::Stopped(self.url().to_string()))
    }

    /// See [`FetchSource::set_reload_interval`]. Takes effect when the
    /// next timer is armed.
    pub fn set_reload_interval(&self, candidate: Duration) -> bool {
        let applied = self.shared.source().set_reload_interval(candidate);
        if applied {
            self.shared
                .status
                .send_modify(|s| s.reload_interval = candidate);
            tracing::debug!(
                url = %self.url(),
                interval_ms = candidate.as_millis() as u64,
                "Reload interval shortened"
            );
        }
        applied
    }

    pub fn on_items_received<F>(&self, callback: F)
    where
        F: Fn(&FeedView) + Send + Sync + 'static,
    {
        self.shared.hub.on_items_received(callback);
    }

    pub fn on_fetch_failed<F>(&self, callback: F)
    where
        F: Fn(&FeedView, &FetchError) + Send + Sync + 'static,
    {
        self.shared.hub.on_fetch_failed(callback);
    }

    /// Re-sends the current cache to the items-received handler, if non-empty.
    pub fn broadcast(&self) -> bool {
        self.shared.hub.broadcast(self.reload_interval())
    }

    pub fn url(&self) -> &str {
        self.shared.hub.url()
    }

    pub fn items(&self) -> Arc<[DisplayItem]> {
        self.shared.hub.items()
    }

    pub fn reload_interval(&self) -> Duration {
        self.shared.reload_interval()
    }

    pub fn status(&self) -> FetchStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FetchStatus> {
        self.shared.status.subscribe()
    }

    /// Stops the poller after any in-flight cycle and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Poller task ended abnormally");
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("url", &self.url())
            .field("status", &self.status())
            .finish()
    }
}

/// The background task behind a [`Fetcher`].
struct Poller {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    fallback: Option<FeedPayload>,
    commands: mpsc::Receiver<Command>,
    next_tick: Option<Instant>,
}

impl Poller {
    async fn run(mut self) {
        loop {
            let deadline = self.next_tick;
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::StartFetch) => self.run_cycle().await,
                    Some(Command::Shutdown) | None => break,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.run_cycle().await;
                }
            }
        }

        self.next_tick = None;
        self.set_state(CycleState::Idle);
        tracing::debug!(url = %self.shared.hub.url(), "Poller stopped");
    }

    async fn run_cycle(&mut self) {
        if self.next_tick.take().is_some() {
            tracing::debug!(url = %self.shared.hub.url(), "Cancelled pending reload timer");
        }
        self.shared.hub.replace_items(Vec::new());
        self.shared.status.send_modify(|s| {
            s.state = CycleState::Fetching;
            s.items = 0;
        });

        let url = self.shared.hub.url().to_string();
        match attempt_fetch(self.transport.as_ref(), &url).await {
            FetchOutcome::Success(payload) => self.process(&payload, false),
            FetchOutcome::ConnectionRefused(detail) => match &self.fallback {
                Some(fallback) => {
                    tracing::info!(
                        url = %url,
                        detail = %detail,
                        "Connection refused, serving fallback data"
                    );
                    self.process(fallback, true);
                }
                None => {
                    self.fail(FetchError::Transport(TransportError::ConnectionRefused(detail)));
                }
            },
            FetchOutcome::OtherError(e) => self.fail(e),
        }

        self.schedule();
    }

    /// Normalizes, replaces the cache, then notifies.
    fn process(&self, payload: &FeedPayload, served_fallback: bool) {
        let items = normalize(payload);
        let count = items.len();
        self.shared.hub.replace_items(items);
        self.shared.status.send_modify(|s| {
            s.items = count;
            s.last_success = Some(Utc::now());
            s.last_error = None;
            s.served_fallback = served_fallback;
        });

        tracing::info!(
            url = %self.shared.hub.url(),
            items = count,
            fallback = served_fallback,
            "Fetched items"
        );
        self.shared.hub.broadcast(self.shared.reload_interval());
    }

    fn fail(&self, error: FetchError) {
        tracing::warn!(url = %self.shared.hub.url(), error = %error, "Fetch failed, will retry");
        self.shared
            .status
            .send_modify(|s| s.last_error = Some(error.to_string()));
        self.shared
            .hub
            .notify_failed(self.shared.reload_interval(), &error);
    }

    fn schedule(&mut self) {
        let interval = self.shared.reload_interval();
        self.next_tick = Some(Instant::now() + interval);
        self.shared.status.send_modify(|s| {
            s.state = CycleState::Scheduled;
            s.cycles += 1;
            s.reload_interval = interval;
        });
        tracing::debug!(
            url = %self.shared.hub.url(),
            interval_ms = interval.as_millis() as u64,
            "Scheduled next fetch"
        );
    }

    fn set_state(&self, state: CycleState) {
        self.shared.status.send_modify(|s| s.state = state);
    }
}
