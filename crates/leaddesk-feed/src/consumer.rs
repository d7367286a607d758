//! Feed state machine.
//!
//! ```text
//!            subscribe ok + first event
//!   Loading ─────────────────────────────▶ Live
//!      │                                     │
//!      │ subscribe error /    stream error / │
//!      │ handshake timeout    stream closed  │
//!      ▼                                     ▼
//!   DegradedPolling ◀─────────────────────────
//!      │
//!      └── retry live ──▶ Loading
//! ```
//!
//! Refresh and retry are served in every state, including while a
//! subscription handshake is still pending.
//!
//! The subscription and the poll loop never run together: both live inside
//! one driver task and the current [`Mode`] owns whichever is active.
//! Dropping the [`LiveFeed`] handle aborts the driver, which drops the
//! stream or the interval with it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use leaddesk_core::Contact;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::error::FeedError;
use crate::source::{apply_change, ChangeStream, FeedEvent, LeadFeedSource};

/// Pull interval while degraded.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long a subscription may take to open before the feed degrades.
pub const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(15);

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Loading,
    Live,
    DegradedPolling,
}

impl FeedState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedState::Loading => "loading",
            FeedState::Live => "live",
            FeedState::DegradedPolling => "degraded_polling",
        }
    }
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a UI needs to render the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedStatus {
    pub state: FeedState,
    /// Most recent subscription or pull failure. Not cleared by later pulls.
    pub last_error: Option<String>,
    /// Active leads, newest activity first.
    pub leads: Vec<Contact>,
    /// Pull attempts so far, successful or not.
    pub pulls: u64,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self {
            state: FeedState::Loading,
            last_error: None,
            leads: Vec::new(),
            pulls: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    RetryLive,
    Refresh,
}

/// Handle to a running feed consumer.
pub struct LiveFeed {
    status: watch::Receiver<FeedStatus>,
    commands: mpsc::Sender<Command>,
    driver: JoinHandle<()>,
}

impl LiveFeed {
    /// Start consuming `source`. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn(source: Arc<dyn LeadFeedSource>) -> Self {
        Self::with_poll_interval(source, POLL_INTERVAL)
    }

    #[must_use]
    pub fn with_poll_interval(source: Arc<dyn LeadFeedSource>, poll_interval: Duration) -> Self {
        let (status_tx, status) = watch::channel(FeedStatus::default());
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = Driver {
            source,
            status: status_tx,
            commands: command_rx,
            poll_interval,
        };
        Self {
            status,
            commands,
            driver: tokio::spawn(driver.run()),
        }
    }

    #[must_use]
    pub fn status(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> FeedState {
        self.status.borrow().state
    }

    /// A receiver that observes every status change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }

    /// Stop polling and reopen the live subscription.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::DriverStopped`] if the driver task has exited.
    pub async fn retry_live(&self) -> Result<(), FeedError> {
        self.send(Command::RetryLive).await
    }

    /// Pull the lead list once. The state is left as it is.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::DriverStopped`] if the driver task has exited.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        self.send(Command::Refresh).await
    }

    async fn send(&self, command: Command) -> Result<(), FeedError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| FeedError::DriverStopped)
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

enum Mode {
    Subscribing,
    Streaming(ChangeStream),
    Polling(Interval),
}

struct Driver {
    source: Arc<dyn LeadFeedSource>,
    status: watch::Sender<FeedStatus>,
    commands: mpsc::Receiver<Command>,
    poll_interval: Duration,
}

impl Driver {
    async fn run(mut self) {
        let mut mode = Mode::Subscribing;
        loop {
            let next = match mode {
                Mode::Subscribing => self.open().await,
                Mode::Streaming(stream) => self.stream_step(stream).await,
                Mode::Polling(ticker) => self.poll_step(ticker).await,
            };
            match next {
                Some(m) => mode = m,
                None => {
                    tracing::debug!("feed handle dropped; driver exiting");
                    return;
                }
            }
        }
    }

    async fn open(&mut self) -> Option<Mode> {
        self.set_state(FeedState::Loading);
        let handshake = tokio::time::timeout(SUBSCRIBE_TIMEOUT, self.source.subscribe());
        tokio::pin!(handshake);
        loop {
            tokio::select! {
                opened = &mut handshake => return Some(match opened {
                    Ok(Ok(stream)) => Mode::Streaming(stream),
                    Ok(Err(e)) => self.degrade(&e),
                    Err(_) => self.degrade(&FeedError::SubscribeTimeout),
                }),
                command = self.commands.recv() => match command? {
                    Command::RetryLive => return Some(Mode::Subscribing),
                    Command::Refresh => self.pull().await,
                },
            }
        }
    }

    async fn stream_step(&mut self, mut stream: ChangeStream) -> Option<Mode> {
        tokio::select! {
            item = stream.next() => Some(match item {
                Some(Ok(event)) => {
                    self.apply(event);
                    Mode::Streaming(stream)
                }
                Some(Err(e)) => self.degrade(&e),
                None => self.degrade(&FeedError::Closed),
            }),
            command = self.commands.recv() => match command? {
                Command::RetryLive => Some(Mode::Subscribing),
                Command::Refresh => {
                    self.pull().await;
                    Some(Mode::Streaming(stream))
                }
            },
        }
    }

    async fn poll_step(&mut self, mut ticker: Interval) -> Option<Mode> {
        tokio::select! {
            _ = ticker.tick() => {
                self.pull().await;
                Some(Mode::Polling(ticker))
            }
            command = self.commands.recv() => match command? {
                Command::RetryLive => {
                    tracing::info!("retrying live lead subscription");
                    Some(Mode::Subscribing)
                }
                Command::Refresh => {
                    self.pull().await;
                    Some(Mode::Polling(ticker))
                }
            },
        }
    }

    fn apply(&self, event: FeedEvent) {
        let was = self.status.borrow().state;
        self.status.send_modify(|s| {
            match event {
                FeedEvent::Snapshot(leads) => s.leads = leads,
                FeedEvent::Change(change) => apply_change(&mut s.leads, &change),
            }
            s.state = FeedState::Live;
        });
        if was != FeedState::Live {
            tracing::info!("lead feed is live");
        }
    }

    /// Switch to polling. The first tick fires immediately.
    fn degrade(&self, error: &FeedError) -> Mode {
        tracing::warn!(
            error = %error,
            poll_secs = self.poll_interval.as_secs(),
            "live lead subscription failed; polling"
        );
        self.status.send_modify(|s| {
            s.state = FeedState::DegradedPolling;
            s.last_error = Some(error.to_string());
        });
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Mode::Polling(ticker)
    }

    async fn pull(&self) {
        match self.source.fetch_leads().await {
            Ok(leads) => self.status.send_modify(|s| {
                s.leads = leads;
                s.pulls += 1;
            }),
            Err(e) => {
                tracing::warn!(error = %e, "lead pull failed");
                self.status.send_modify(|s| {
                    s.last_error = Some(e.to_string());
                    s.pulls += 1;
                });
            }
        }
    }

    fn set_state(&self, state: FeedState) {
        self.status.send_if_modified(|s| {
            let changed = s.state != state;
            s.state = state;
            changed
        });
    }
}
