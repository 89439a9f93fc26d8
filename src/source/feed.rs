//! Live feed: the single place where snapshots are accumulated.
//!
//! One task drives the [`StreamOrchestrator`], folds every snapshot into a
//! [`SeriesAccumulator`] and publishes the result as an immutable
//! [`FeedFrame`]. Any number of [`FeedSubscription`]s share that one result.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::orchestrator::{StreamOrchestrator, TransportMode};
use super::socket::ConnectionStatus;
use super::{DataSource, LinkState, StateSnapshot};
use crate::data::series::{ChartData, SeriesAccumulator};

/// One published accumulator result.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedFrame {
    /// Position in the feed, starting at 1.
    pub sequence: u64,
    /// Arrival time, unix milliseconds.
    pub received_at_ms: u64,
    /// Transport the snapshot arrived over.
    pub transport: TransportMode,
    pub snapshot: StateSnapshot,
    pub charts: ChartData,
}

impl FeedFrame {
    /// Frame for a single, isolated snapshot.
    ///
    /// Used when there is no running feed, e.g. for a one-shot export. The
    /// charts contain only what one sample can produce.
    pub fn single(
        snapshot: StateSnapshot,
        received_at_ms: u64,
        transport: TransportMode,
        window_ms: u64,
    ) -> Self {
        let mut accumulator = SeriesAccumulator::new(window_ms);
        accumulator.accumulate(received_at_ms, &snapshot);
        Self {
            sequence: 1,
            received_at_ms,
            transport,
            snapshot,
            charts: accumulator.chart_data(),
        }
    }
}

/// Current wall-clock time in unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Arrival clock for a feed: unix milliseconds at creation, advanced by a
/// monotonic clock afterwards.
#[derive(Debug, Clone, Copy)]
pub struct FeedClock {
    origin_ms: u64,
    origin: Instant,
}

impl FeedClock {
    pub fn new() -> Self {
        Self {
            origin_ms: now_ms(),
            origin: Instant::now(),
        }
    }

    /// Unix-like milliseconds that never go backwards.
    pub fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.origin_ms.saturating_add(elapsed)
    }
}

impl Default for FeedClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the feed task.
#[derive(Debug)]
pub struct LiveFeed {
    frames: watch::Receiver<Option<Arc<FeedFrame>>>,
    status: watch::Receiver<ConnectionStatus>,
    mode: watch::Receiver<TransportMode>,
    description: String,
    task: JoinHandle<()>,
}

impl LiveFeed {
    /// Start the feed task. Must be called within a tokio runtime.
    ///
    /// The task ends on its own once this handle and every subscription
    /// are dropped.
    pub fn spawn(orchestrator: StreamOrchestrator, window_ms: u64) -> Self {
        let (tx, frames) = watch::channel(None);
        let status = orchestrator.subscribe_status();
        let mode = orchestrator.subscribe_mode();
        let description = orchestrator.describe();

        let task = tokio::spawn(run_feed(orchestrator, window_ms, tx));

        Self {
            frames,
            status,
            mode,
            description,
            task,
        }
    }

    /// A new view onto the feed. The latest frame, if any, is delivered on
    /// its first poll.
    pub fn subscribe(&self) -> FeedSubscription {
        FeedSubscription::new(
            self.frames.clone(),
            self.status.clone(),
            self.mode.clone(),
            &self.description,
        )
    }

    /// Latest frame without consuming change notifications.
    pub fn latest(&self) -> Option<Arc<FeedFrame>> {
        self.frames.borrow().clone()
    }

    /// Stop the feed now, dropping the orchestrator and its transports.
    pub fn shutdown(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_feed(
    mut orchestrator: StreamOrchestrator,
    window_ms: u64,
    tx: watch::Sender<Option<Arc<FeedFrame>>>,
) {
    let mut accumulator = SeriesAccumulator::new(window_ms);
    let mut sequence = 0u64;
    let clock = FeedClock::new();

    loop {
        let snapshot = tokio::select! {
            _ = tx.closed() => break,
            snapshot = orchestrator.next_snapshot() => snapshot,
        };

        let received_at_ms = clock.now_ms();
        accumulator.accumulate(received_at_ms, &snapshot);
        sequence += 1;

        let frame = FeedFrame {
            sequence,
            received_at_ms,
            transport: orchestrator.mode(),
            snapshot,
            charts: accumulator.chart_data(),
        };
        debug!(sequence, transport = frame.transport.label(), "publishing frame");
        tx.send_replace(Some(Arc::new(frame)));
    }

    info!("all feed subscribers gone, stopping");
}

/// A [`DataSource`] backed by a [`LiveFeed`].
#[derive(Debug, Clone)]
pub struct FeedSubscription {
    frames: watch::Receiver<Option<Arc<FeedFrame>>>,
    status: watch::Receiver<ConnectionStatus>,
    mode: watch::Receiver<TransportMode>,
    description: String,
}

impl FeedSubscription {
    pub fn new(
        mut frames: watch::Receiver<Option<Arc<FeedFrame>>>,
        status: watch::Receiver<ConnectionStatus>,
        mode: watch::Receiver<TransportMode>,
        source_description: &str,
    ) -> Self {
        frames.mark_changed();
        Self {
            frames,
            status,
            mode,
            description: format!("live: {}", source_description),
        }
    }
}

impl DataSource for FeedSubscription {
    fn poll(&mut self) -> Option<Arc<FeedFrame>> {
        // Once the feed stops there is nothing new to report.
        if self.frames.has_changed().unwrap_or(false) {
            self.frames.borrow_and_update().clone()
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn link(&self) -> LinkState {
        LinkState {
            status: self.status.borrow().clone(),
            mode: *self.mode.borrow(),
        }
    }
}
