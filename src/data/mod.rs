//! Data models and processing for feed frames.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "4s", "500ms")
//! - [`series`]: The windowed rate accumulator ([`SeriesAccumulator`]) and chart model
//! - [`console`]: Health-annotated worker table ([`ConsoleData`], [`WorkerRow`])
//!
//! ## Data Flow
//!
//! ```text
//! StateSnapshot (push frame or GET /state)
//!        │
//!        ▼
//! SeriesAccumulator::accumulate()  ──▶ ChartData
//!        │
//!        ▼
//! FeedFrame ──▶ ConsoleData::from_frame()
//!                    │
//!                    └──▶ WorkerRow (with health status computed from Thresholds)
//! ```

pub mod console;
pub mod duration;
pub mod series;

pub use console::{ConsoleData, HealthCounts, HealthStatus, Thresholds, WorkerRow};
pub use series::{ChartData, Point, Series, SeriesAccumulator, WorkerSeries, DEFAULT_WINDOW_MS};
