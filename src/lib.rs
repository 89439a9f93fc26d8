// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # lb-console
//!
//! A live operations console for a load-balancing test harness.
//!
//! The console follows the balancer's state over a WebSocket push stream,
//! falls back to polling `GET /state` once a second while the stream is
//! down, and turns successive snapshots into rate series (throughput,
//! failure rate, per-worker share and latency) over a trailing window.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Application                            │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌──────────┐      │
//! │  │  app    │───▶│   data   │───▶│   ui    │───▶│ Terminal │      │
//! │  │ (state) │    │(health,  │    │(tables, │    │          │      │
//! │  └────┬────┘    │ series)  │    │ charts) │    └──────────┘      │
//! │       │         └──────────┘    └─────────┘                      │
//! │       ▼                                                          │
//! │  ┌─────────┐                                                     │
//! │  │ source  │◀── LiveFeed ◀── StreamOrchestrator ◀── PushSocket   │
//! │  │ (input) │                                    ◀── StateFetcher │
//! │  └─────────┘                                                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Push socket with staleness watchdog, HTTP poller,
//!   push/pull orchestration with reconnect backoff, and the shared
//!   [`LiveFeed`] consumed through the [`DataSource`] trait
//! - **[`data`]**: The windowed [`SeriesAccumulator`] and the health-annotated
//!   worker table ([`ConsoleData`])
//! - **[`app`]**: Application state, view navigation, and user interaction logic
//! - **[`ui`]**: Terminal rendering using ratatui
//! - **[`config`]**: Layered settings (defaults, TOML file, environment, flags)
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch a balancer on the default port
//! lb-console --url http://localhost:8000
//!
//! # Write one snapshot to JSON and exit
//! lb-console --url http://localhost:8000 --export state.json
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lb_console::{
//!     App, HttpStateFetcher, LiveFeed, PushSocket, ReconnectSchedule, StreamOrchestrator,
//!     Thresholds, DEFAULT_POLL_INTERVAL, DEFAULT_WINDOW_MS,
//! };
//!
//! # tokio_test::block_on(async {
//! let socket = PushSocket::new("ws://localhost:8000/stream", Duration::from_secs(4));
//! let fetcher =
//!     HttpStateFetcher::new("http://localhost:8000/state", Duration::from_secs(2)).unwrap();
//! let orchestrator = StreamOrchestrator::new(
//!     socket,
//!     Arc::new(fetcher),
//!     ReconnectSchedule::default(),
//!     DEFAULT_POLL_INTERVAL,
//! );
//!
//! let feed = LiveFeed::spawn(orchestrator, DEFAULT_WINDOW_MS);
//! let app = App::new(Box::new(feed.subscribe()), Thresholds::default());
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod logging;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::{ConsoleConfig, Settings};
pub use data::{
    ChartData, ConsoleData, HealthStatus, SeriesAccumulator, Thresholds, WorkerRow,
    DEFAULT_WINDOW_MS,
};
pub use error::{ConfigError, PollError};
pub use source::{
    CloseReason, ConnectionStatus, DataSource, FeedFrame, HttpStateFetcher, LiveFeed, PushSocket,
    ReconnectSchedule, StateFetcher, StateSnapshot, StreamOrchestrator, TransportMode,
    WorkerSnapshot, DEFAULT_POLL_INTERVAL,
};
