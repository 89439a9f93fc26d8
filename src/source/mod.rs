//! Input side: how load-balancer state reaches the console.
//!
//! ```text
//!   PushSocket ──┐
//!                ├──▶ StreamOrchestrator ──▶ LiveFeed ──▶ FeedSubscription (DataSource)
//!   StateFetcher ┘        (push / pull)      (accumulate)
//! ```
//!
//! The [`DataSource`] trait is what the UI consumes; everything else in this
//! module exists to produce frames for it.

mod backoff;
mod feed;
mod orchestrator;
mod poller;
mod snapshot;
mod socket;

pub use backoff::ReconnectSchedule;
pub use feed::{now_ms, FeedFrame, FeedSubscription, LiveFeed};
pub use orchestrator::{
    LinkMachine, ReconnectAction, StreamOrchestrator, TransportMode, DEFAULT_POLL_INTERVAL,
};
pub use poller::{HttpStateFetcher, StateFetcher};
pub use snapshot::{StateSnapshot, StreamMessage, WeightMode, WorkerSnapshot};
pub use socket::{CloseReason, ConnectionStatus, PushSocket, SocketEvent, MIN_WATCHDOG_PERIOD};

use std::fmt::Debug;
use std::sync::Arc;

/// Connection status and transport mode, read together for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    pub status: ConnectionStatus,
    pub mode: TransportMode,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            mode: TransportMode::Push,
        }
    }
}

/// Trait for receiving feed frames.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use lb_console::source::{
///     DataSource, HttpStateFetcher, LiveFeed, PushSocket, ReconnectSchedule,
///     StreamOrchestrator, DEFAULT_POLL_INTERVAL,
/// };
///
/// # tokio_test::block_on(async {
/// let socket = PushSocket::new("ws://localhost:8080/stream", Duration::from_secs(4));
/// let fetcher = HttpStateFetcher::new("http://localhost:8080/state", Duration::from_secs(2)).unwrap();
/// let orchestrator = StreamOrchestrator::new(
///     socket,
///     Arc::new(fetcher),
///     ReconnectSchedule::default(),
///     DEFAULT_POLL_INTERVAL,
/// );
///
/// let feed = LiveFeed::spawn(orchestrator, 120_000);
/// let mut source = feed.subscribe();
/// if let Some(frame) = source.poll() {
///     println!("{} workers", frame.snapshot.workers.len());
/// }
/// # });
/// ```
pub trait DataSource: Send + Debug {
    /// Poll for the latest frame.
    ///
    /// Returns `Some(frame)` if a new frame is available, `None` otherwise.
    /// This method should be non-blocking.
    fn poll(&mut self) -> Option<Arc<FeedFrame>>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Current state of the underlying transports.
    fn link(&self) -> LinkState;
}
