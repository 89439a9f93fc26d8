//! Stream orchestrator: one snapshot sequence over two transports.
//!
//! The push socket is preferred. Whenever it is down the orchestrator polls
//! the state endpoint instead, and keeps retrying the socket with backoff.
//!
//! ```text
//!              Connected                     Disconnected
//!   ┌──────────────────────────┐    ┌───────────────────────────────┐
//!   │ mode = Push              │───▶│ mode = Pull                   │
//!   │ frames tagged "state"    │    │ GET /state now, then every 1s │
//!   │ no reconnect timer       │◀───│ reconnect after schedule[n]   │
//!   └──────────────────────────┘    └───────────────────────────────┘
//! ```

use std::fmt;
use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use super::backoff::ReconnectSchedule;
use super::poller::StateFetcher;
use super::socket::{CloseReason, ConnectionStatus, PushSocket, SocketEvent};
use super::snapshot::{StateSnapshot, StreamMessage};
use crate::error::PollError;

/// Default cadence of the pull transport.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Which transport currently feeds the snapshot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Push,
    Pull,
}

impl TransportMode {
    pub fn label(&self) -> &'static str {
        match self {
            TransportMode::Push => "push",
            TransportMode::Pull => "pull",
        }
    }
}

/// What to do with the reconnect timer after a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Drop any pending reconnect.
    Cancel,
    /// Try to connect again after the delay.
    Arm(Duration),
}

/// Transport mode state machine, driven by connection status.
#[derive(Debug, Clone)]
pub struct LinkMachine {
    mode: TransportMode,
    schedule: ReconnectSchedule,
    /// Disconnects observed since the last successful connection.
    consecutive_failures: usize,
}

impl LinkMachine {
    pub fn new(schedule: ReconnectSchedule) -> Self {
        Self {
            mode: TransportMode::Push,
            schedule,
            consecutive_failures: 0,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    /// Apply a status transition.
    pub fn observe(&mut self, status: &ConnectionStatus) -> ReconnectAction {
        match status {
            ConnectionStatus::Connected => {
                self.mode = TransportMode::Push;
                self.consecutive_failures = 0;
                ReconnectAction::Cancel
            }
            ConnectionStatus::Disconnected(_) => {
                self.mode = TransportMode::Pull;
                let delay = self.schedule.delay_for(self.consecutive_failures);
                self.consecutive_failures += 1;
                ReconnectAction::Arm(delay)
            }
            ConnectionStatus::Connecting => ReconnectAction::Cancel,
        }
    }
}

type PollFuture = Pin<Box<dyn Future<Output = Result<StateSnapshot, PollError>> + Send>>;

/// Outcome of one wait on the orchestrator's event sources.
enum Step {
    Socket(SocketEvent),
    Reconnect,
    PollTick,
    Polled(Result<StateSnapshot, PollError>),
}

/// Owns the transports and yields one unified sequence of snapshots.
///
/// All timers and the socket are fields: dropping the orchestrator releases
/// every one of them.
pub struct StreamOrchestrator {
    socket: PushSocket,
    fetcher: Arc<dyn StateFetcher>,
    link: LinkMachine,
    mode_tx: watch::Sender<TransportMode>,
    poll_interval: Duration,
    poll_timer: Option<Interval>,
    in_flight: Option<PollFuture>,
    reconnect: Option<Pin<Box<Sleep>>>,
    started: bool,
}

impl StreamOrchestrator {
    pub fn new(
        socket: PushSocket,
        fetcher: Arc<dyn StateFetcher>,
        schedule: ReconnectSchedule,
        poll_interval: Duration,
    ) -> Self {
        let link = LinkMachine::new(schedule);
        let (mode_tx, _) = watch::channel(link.mode());
        Self {
            socket,
            fetcher,
            link,
            mode_tx,
            poll_interval,
            poll_timer: None,
            in_flight: None,
            reconnect: None,
            started: false,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.link.mode()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.socket.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.socket.subscribe_status()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<TransportMode> {
        self.mode_tx.subscribe()
    }

    /// Human-readable description of both transports.
    pub fn describe(&self) -> String {
        format!("{} | {}", self.socket.url(), self.fetcher.endpoint())
    }

    /// Wait for the next snapshot from whichever transport is active.
    ///
    /// The first call opens the push connection. Transport failures never
    /// end the sequence; they switch to polling and schedule a reconnect.
    pub async fn next_snapshot(&mut self) -> StateSnapshot {
        if !self.started {
            self.started = true;
            self.socket.connect();
            self.apply_status();
        }

        loop {
            match self.step().await {
                Step::Socket(event) => {
                    if let Some(snapshot) = self.on_socket_event(event) {
                        return snapshot;
                    }
                }
                Step::Reconnect => {
                    self.reconnect = None;
                    info!(attempt = self.link.consecutive_failures(), "reconnecting push transport");
                    self.socket.connect();
                    self.apply_status();
                }
                Step::PollTick => {
                    let fetcher = Arc::clone(&self.fetcher);
                    self.in_flight = Some(Box::pin(async move { fetcher.fetch_state().await }));
                }
                Step::Polled(result) => {
                    self.in_flight = None;
                    match result {
                        Ok(snapshot) => return snapshot,
                        Err(e) => warn!(error = %e, "state poll failed"),
                    }
                }
            }
        }
    }

    async fn step(&mut self) -> Step {
        let Self {
            socket,
            poll_timer,
            in_flight,
            reconnect,
            ..
        } = self;
        let idle = in_flight.is_none();

        tokio::select! {
            event = socket.recv() => Step::Socket(event),
            () = sleep_opt(reconnect) => Step::Reconnect,
            () = tick_opt(poll_timer), if idle => Step::PollTick,
            result = finish_opt(in_flight) => Step::Polled(result),
        }
    }

    fn on_socket_event(&mut self, event: SocketEvent) -> Option<StateSnapshot> {
        match event {
            SocketEvent::Frame(value) => {
                if self.link.mode() != TransportMode::Push {
                    return None;
                }
                let snapshot = StreamMessage::into_state(value);
                if snapshot.is_none() {
                    debug!("ignoring non-state frame");
                }
                snapshot
            }
            SocketEvent::Opened | SocketEvent::Closed(_) => {
                self.apply_status();
                None
            }
        }
    }

    /// React to the socket's current status.
    fn apply_status(&mut self) {
        let status = self.socket.status();
        let previous = self.link.mode();

        match self.link.observe(&status) {
            ReconnectAction::Cancel => self.reconnect = None,
            ReconnectAction::Arm(delay) => {
                info!(status = %status.label(), ?delay, "push transport down, scheduling reconnect");
                self.reconnect = Some(Box::pin(time::sleep(delay)));
            }
        }

        let mode = self.link.mode();
        if mode != previous {
            info!(mode = mode.label(), "transport mode changed");
            self.mode_tx.send_replace(mode);
        }

        match mode {
            TransportMode::Push => {
                // Dropping an in-flight poll guarantees it is never delivered.
                self.poll_timer = None;
                self.in_flight = None;
            }
            TransportMode::Pull => {
                if self.poll_timer.is_none() {
                    // The first tick completes immediately.
                    let mut timer = time::interval(self.poll_interval);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.poll_timer = Some(timer);
                }
            }
        }
    }
}

impl Drop for StreamOrchestrator {
    fn drop(&mut self) {
        self.socket.close(CloseReason::ClientClose);
    }
}

impl fmt::Debug for StreamOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOrchestrator")
            .field("socket", &self.socket.url())
            .field("fetcher", &self.fetcher.endpoint())
            .field("mode", &self.link.mode())
            .field("polling", &self.poll_timer.is_some())
            .field("reconnect_pending", &self.reconnect.is_some())
            .finish()
    }
}

async fn sleep_opt(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

async fn tick_opt(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending().await,
    }
}

async fn finish_opt(poll: &mut Option<PollFuture>) -> Result<StateSnapshot, PollError> {
    match poll {
        Some(poll) => poll.await,
        None => future::pending().await,
    }
}
