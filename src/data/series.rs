//! Windowed rate series built from cumulative counters.
//!
//! [`SeriesAccumulator`] is a pure reducer: it consumes snapshots in arrival
//! order and keeps four families of series over a trailing window:
//!
//! - aggregate throughput (assignments per second)
//! - aggregate failure rate (percent of completed requests)
//! - per-worker traffic share (percent)
//! - per-worker average latency (ms)
//!
//! Rates need two samples. The first sample after start or after a counter
//! reset only establishes the baseline.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::source::StateSnapshot;

/// Default trailing window: two minutes.
pub const DEFAULT_WINDOW_MS: u64 = 120_000;

/// One chart point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub timestamp_ms: u64,
    pub value: f64,
}

impl Point {
    pub fn new(timestamp_ms: u64, value: f64) -> Self {
        Self { timestamp_ms, value }
    }
}

/// Ordered points with non-decreasing timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    points: VecDeque<Point>,
}

impl Series {
    pub fn push(&mut self, timestamp_ms: u64, value: f64) {
        self.points.push_back(Point::new(timestamp_ms, value));
    }

    /// Drop every point older than `cutoff_ms`.
    pub fn trim_before(&mut self, cutoff_ms: u64) {
        while self.points.front().is_some_and(|p| p.timestamp_ms < cutoff_ms) {
            self.points.pop_front();
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest value in the series, or 0 when empty.
    pub fn max_value(&self) -> f64 {
        self.points.iter().map(|p| p.value).fold(0.0, f64::max)
    }

    /// `(x, y)` pairs for a chart, with x in seconds relative to `origin_ms`.
    pub fn to_chart_points(&self, origin_ms: u64) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|p| {
                let offset = p.timestamp_ms as f64 - origin_ms as f64;
                (offset / 1000.0, p.value)
            })
            .collect()
    }
}

/// The cumulative counters rates are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub assigned: u64,
    pub ok: u64,
    pub fail: u64,
}

impl Counters {
    pub fn of(snapshot: &StateSnapshot) -> Self {
        Self {
            assigned: snapshot.total_assigned,
            ok: snapshot.total_ok,
            fail: snapshot.total_fail,
        }
    }
}

/// True when any counter went backwards, i.e. the server restarted or the
/// experiment was reset.
pub fn is_reset(prev: &Counters, next: &Counters) -> bool {
    next.assigned < prev.assigned || next.ok < prev.ok || next.fail < prev.fail
}

/// Per-worker series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerSeries {
    /// Share of assignments, percent.
    pub share: Series,
    /// Average latency, milliseconds.
    pub latency: Series,
}

/// Owned copy of every series at one instant, ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub window_ms: u64,
    /// Timestamp of the latest accepted sample.
    pub latest_ms: Option<u64>,
    pub throughput: Series,
    pub failure_rate: Series,
    /// Workers in first-seen order.
    pub workers: Vec<(String, WorkerSeries)>,
}

impl ChartData {
    pub fn worker(&self, id: &str) -> Option<&WorkerSeries> {
        self.workers.iter().find(|(w, _)| w == id).map(|(_, s)| s)
    }

    /// Left edge of the window, for chart x bounds.
    pub fn window_start_ms(&self) -> u64 {
        self.latest_ms.map_or(0, |t| t.saturating_sub(self.window_ms))
    }
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    timestamp_ms: u64,
    counters: Counters,
}

/// Accumulates snapshots into windowed series.
#[derive(Debug, Clone)]
pub struct SeriesAccumulator {
    window_ms: u64,
    baseline: Option<Baseline>,
    throughput: Series,
    failure_rate: Series,
    /// Append-only, first-seen order.
    worker_order: Vec<String>,
    workers: HashMap<String, WorkerSeries>,
}

impl Default for SeriesAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl SeriesAccumulator {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            baseline: None,
            throughput: Series::default(),
            failure_rate: Series::default(),
            worker_order: Vec::new(),
            workers: HashMap::new(),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Worker ids in first-seen order.
    pub fn known_workers(&self) -> &[String] {
        &self.worker_order
    }

    pub fn throughput(&self) -> &Series {
        &self.throughput
    }

    pub fn failure_rate(&self) -> &Series {
        &self.failure_rate
    }

    pub fn worker(&self, id: &str) -> Option<&WorkerSeries> {
        self.workers.get(id)
    }

    /// Fold one snapshot taken at `timestamp_ms` into the series.
    pub fn accumulate(&mut self, timestamp_ms: u64, snapshot: &StateSnapshot) {
        let counters = Counters::of(snapshot);

        let Some(baseline) = self.baseline else {
            self.seed(timestamp_ms, snapshot);
            return;
        };

        if is_reset(&baseline.counters, &counters) {
            self.seed(timestamp_ms, snapshot);
            return;
        }

        self.register_workers(snapshot);

        if timestamp_ms <= baseline.timestamp_ms {
            return;
        }
        let dt = (timestamp_ms - baseline.timestamp_ms) as f64 / 1000.0;

        let d_assigned = counters.assigned - baseline.counters.assigned;
        let d_ok = counters.ok - baseline.counters.ok;
        let d_fail = counters.fail - baseline.counters.fail;

        self.throughput.push(timestamp_ms, d_assigned as f64 / dt);

        let completed = d_ok + d_fail;
        let failure_pct = if completed > 0 {
            d_fail as f64 / completed as f64 * 100.0
        } else {
            0.0
        };
        self.failure_rate.push(timestamp_ms, failure_pct);

        self.push_worker_points(timestamp_ms, snapshot);
        self.baseline = Some(Baseline {
            timestamp_ms,
            counters,
        });
        self.trim(timestamp_ms);
    }

    /// Owned copy of every series.
    pub fn chart_data(&self) -> ChartData {
        ChartData {
            window_ms: self.window_ms,
            latest_ms: self.baseline.map(|b| b.timestamp_ms),
            throughput: self.throughput.clone(),
            failure_rate: self.failure_rate.clone(),
            workers: self
                .worker_order
                .iter()
                .map(|id| (id.clone(), self.workers.get(id).cloned().unwrap_or_default()))
                .collect(),
        }
    }

    /// Start over from a single sample.
    fn seed(&mut self, timestamp_ms: u64, snapshot: &StateSnapshot) {
        self.throughput = Series::default();
        self.failure_rate = Series::default();
        self.worker_order.clear();
        self.workers.clear();

        self.register_workers(snapshot);
        self.push_worker_points(timestamp_ms, snapshot);
        self.baseline = Some(Baseline {
            timestamp_ms,
            counters: Counters::of(snapshot),
        });
    }

    fn register_workers(&mut self, snapshot: &StateSnapshot) {
        for worker in &snapshot.workers {
            if !self.workers.contains_key(&worker.id) {
                self.worker_order.push(worker.id.clone());
                self.workers.insert(worker.id.clone(), WorkerSeries::default());
            }
        }
    }

    fn push_worker_points(&mut self, timestamp_ms: u64, snapshot: &StateSnapshot) {
        for worker in &snapshot.workers {
            if let Some(series) = self.workers.get_mut(&worker.id) {
                series.share.push(timestamp_ms, worker.assigned_pct);
                series.latency.push(timestamp_ms, sanitize_latency(worker.avg_latency_ms));
            }
        }
    }

    fn trim(&mut self, latest_ms: u64) {
        let cutoff = latest_ms.saturating_sub(self.window_ms);
        self.throughput.trim_before(cutoff);
        self.failure_rate.trim_before(cutoff);
        for series in self.workers.values_mut() {
            series.share.trim_before(cutoff);
            series.latency.trim_before(cutoff);
        }
    }
}

/// Latency as plotted: non-finite or non-positive readings become 0.
pub fn sanitize_latency(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::WorkerSnapshot;

    fn snapshot(assigned: u64, ok: u64, fail: u64) -> StateSnapshot {
        StateSnapshot {
            total_assigned: assigned,
            total_ok: ok,
            total_fail: fail,
            ..Default::default()
        }
    }

    fn worker(id: &str, pct: f64, latency: f64) -> WorkerSnapshot {
        WorkerSnapshot {
            id: id.to_string(),
            url: format!("http://{}:8000", id),
            online: true,
            assigned_pct: pct,
            avg_latency_ms: latency,
            ..Default::default()
        }
    }

    fn with_workers(mut snapshot: StateSnapshot, workers: Vec<WorkerSnapshot>) -> StateSnapshot {
        snapshot.workers = workers;
        snapshot
    }

    #[test]
    fn test_throughput_from_two_samples() {
        let mut acc = SeriesAccumulator::default();
        acc.accumulate(0, &snapshot(0, 0, 0));
        assert!(acc.throughput().is_empty());

        acc.accumulate(2000, &snapshot(20, 0, 0));
        assert_eq!(acc.throughput().last(), Some(&Point::new(2000, 10.0)));
        assert_eq!(acc.throughput().len(), 1);
    }

    #[test]
    fn test_failure_rate() {
        let mut acc = SeriesAccumulator::default();
        acc.accumulate(0, &snapshot(0, 0, 0));
        acc.accumulate(1000, &snapshot(4, 3, 1));
        assert_eq!(acc.failure_rate().last(), Some(&Point::new(1000, 25.0)));

        // Nothing completed in the interval.
        acc.accumulate(2000, &snapshot(6, 3, 1));
        assert_eq!(acc.failure_rate().last(), Some(&Point::new(2000, 0.0)));
    }

    #[test]
    fn test_counter_reset_discards_series() {
        let mut acc = SeriesAccumulator::default();
        acc.accumulate(
            0,
            &with_workers(snapshot(10, 8, 2), vec![worker("w1", 50.0, 10.0), worker("w2", 50.0, 12.0)]),
        );
        acc.accumulate(
            1000,
            &with_workers(snapshot(20, 16, 4), vec![worker("w1", 50.0, 10.0), worker("w2", 50.0, 12.0)]),
        );
        assert_eq!(acc.throughput().len(), 1);

        acc.accumulate(2000, &with_workers(snapshot(3, 3, 0), vec![worker("w3", 100.0, 5.0)]));

        assert!(acc.throughput().is_empty());
        assert!(acc.failure_rate().is_empty());
        assert_eq!(acc.known_workers(), ["w3".to_string()]);
        let w3 = acc.worker("w3").unwrap();
        assert_eq!(w3.share.points().collect::<Vec<_>>(), vec![&Point::new(2000, 100.0)]);
        assert!(acc.worker("w1").is_none());

        // The resetting sample is the new baseline.
        acc.accumulate(3000, &with_workers(snapshot(5, 5, 0), vec![worker("w3", 100.0, 5.0)]));
        assert_eq!(acc.throughput().last(), Some(&Point::new(3000, 2.0)));
    }

    #[test]
    fn test_reset_on_any_counter() {
        let prev = Counters {
            assigned: 10,
            ok: 5,
            fail: 2,
        };
        assert!(!is_reset(&prev, &prev));
        assert!(is_reset(&prev, &Counters { assigned: 9, ..prev }));
        assert!(is_reset(&prev, &Counters { ok: 4, ..prev }));
        assert!(is_reset(&prev, &Counters { fail: 1, ..prev }));
        assert!(!is_reset(
            &prev,
            &Counters {
                assigned: 11,
                ok: 6,
                fail: 2
            }
        ));
    }

    #[test]
    fn test_new_worker_gets_single_point() {
        let mut acc = SeriesAccumulator::default();
        acc.accumulate(0, &with_workers(snapshot(0, 0, 0), vec![worker("w1", 100.0, 10.0)]));
        acc.accumulate(1000, &with_workers(snapshot(5, 5, 0), vec![worker("w1", 100.0, 10.0)]));
        acc.accumulate(
            2000,
            &with_workers(snapshot(10, 10, 0), vec![worker("w1", 60.0, 10.0), worker("w2", 40.0, 30.0)]),
        );

        assert_eq!(acc.known_workers(), ["w1".to_string(), "w2".to_string()]);
        let w2 = acc.worker("w2").unwrap();
        assert_eq!(w2.share.points().collect::<Vec<_>>(), vec![&Point::new(2000, 40.0)]);
        assert_eq!(w2.latency.points().collect::<Vec<_>>(), vec![&Point::new(2000, 30.0)]);
        assert_eq!(acc.worker("w1").unwrap().share.len(), 3);
    }

    #[test]
    fn test_absent_worker_keeps_series_and_order() {
        let mut acc = SeriesAccumulator::default();
        acc.accumulate(
            0,
            &with_workers(snapshot(0, 0, 0), vec![worker("w1", 50.0, 1.0), worker("w2", 50.0, 1.0)]),
        );
        acc.accumulate(1000, &with_workers(snapshot(2, 2, 0), vec![worker("w2", 100.0, 1.0)]));

        assert_eq!(acc.known_workers(), ["w1".to_string(), "w2".to_string()]);
        assert_eq!(acc.worker("w1").unwrap().share.len(), 1);
        assert_eq!(acc.worker("w2").unwrap().share.len(), 2);
    }

    #[test]
    fn test_non_positive_dt_drops_sample() {
        let mut acc = SeriesAccumulator::default();
        acc.accumulate(1000, &with_workers(snapshot(0, 0, 0), vec![worker("w1", 100.0, 1.0)]));
        acc.accumulate(
            1000,
            &with_workers(snapshot(10, 10, 0), vec![worker("w1", 50.0, 1.0), worker("w2", 50.0, 1.0)]),
        );
        acc.accumulate(500, &snapshot(20, 20, 0));

        assert!(acc.throughput().is_empty());
        assert_eq!(acc.worker("w1").unwrap().share.len(), 1);
        // Registered, but without points.
        assert!(acc.worker("w2").unwrap().share.is_empty());

        // Baseline unchanged: rates are measured from the seed.
        acc.accumulate(3000, &snapshot(40, 40, 0));
        assert_eq!(acc.throughput().last(), Some(&Point::new(3000, 20.0)));
    }

    #[test]
    fn test_invalid_latency_plotted_as_zero() {
        let mut acc = SeriesAccumulator::default();
        acc.accumulate(
            0,
            &with_workers(
                snapshot(0, 0, 0),
                vec![worker("nan", 0.0, f64::NAN), worker("neg", 0.0, -3.0), worker("inf", 0.0, f64::INFINITY)],
            ),
        );
        for id in ["nan", "neg", "inf"] {
            assert_eq!(acc.worker(id).unwrap().latency.last().unwrap().value, 0.0);
        }
        assert_eq!(sanitize_latency(12.5), 12.5);
    }

    #[test]
    fn test_window_trims_old_points() {
        let mut acc = SeriesAccumulator::new(10_000);
        let mut assigned = 0;
        for i in 0..100u64 {
            assigned += 7;
            acc.accumulate(
                i * 1000,
                &with_workers(snapshot(assigned, assigned, 0), vec![worker("w1", 100.0, 2.0)]),
            );
        }

        let latest = 99_000;
        let cutoff = latest - 10_000;
        let data = acc.chart_data();
        assert_eq!(data.latest_ms, Some(latest));
        assert_eq!(data.window_start_ms(), cutoff);
        for series in [&data.throughput, &data.failure_rate] {
            assert!(series.points().all(|p| p.timestamp_ms >= cutoff));
            assert_eq!(series.len(), 11);
        }
        let w1 = data.worker("w1").unwrap();
        assert!(w1.share.points().all(|p| p.timestamp_ms >= cutoff));
        assert!(w1.latency.points().all(|p| p.timestamp_ms >= cutoff));
    }

    #[test]
    fn test_window_trims_absent_workers() {
        let mut acc = SeriesAccumulator::new(5_000);
        acc.accumulate(0, &with_workers(snapshot(0, 0, 0), vec![worker("gone", 100.0, 1.0)]));
        acc.accumulate(10_000, &snapshot(1, 1, 0));

        assert!(acc.worker("gone").unwrap().share.is_empty());
        assert_eq!(acc.known_workers(), ["gone".to_string()]);
    }

    #[test]
    fn test_rates_stay_in_bounds() {
        // Small LCG so the sequence is deterministic.
        let mut seed: u64 = 0x2545_f491;
        let mut next = move |modulo: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % modulo
        };

        let mut acc = SeriesAccumulator::new(30_000);
        let (mut t, mut assigned, mut ok, mut fail) = (0u64, 0u64, 0u64, 0u64);
        for _ in 0..500 {
            t += next(3) * 250;
            assigned += next(50);
            ok += next(40);
            fail += next(10);
            acc.accumulate(t, &snapshot(assigned, ok, fail));

            let cutoff = t.saturating_sub(30_000);
            assert!(acc.throughput().points().all(|p| p.value >= 0.0 && p.value.is_finite()));
            assert!(acc
                .failure_rate()
                .points()
                .all(|p| (0.0..=100.0).contains(&p.value)));
            assert!(acc.throughput().points().all(|p| p.timestamp_ms >= cutoff));
        }
        assert!(!acc.throughput().is_empty());
    }

    #[test]
    fn test_chart_points_relative_to_origin() {
        let mut series = Series::default();
        series.push(10_000, 1.0);
        series.push(12_500, 3.0);
        assert_eq!(series.to_chart_points(10_000), vec![(0.0, 1.0), (2.5, 3.0)]);
        assert_eq!(series.max_value(), 3.0);
    }
}
