//! Worker table and health computation.
//!
//! This module turns a [`FeedFrame`] into rows the UI can render, with a
//! health status per worker computed from configurable thresholds.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;

use super::series::ChartData;
use crate::source::{FeedFrame, TransportMode, WeightMode};

/// Thresholds for health status computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Average latency that triggers a warning.
    pub latency_warning: Duration,
    /// Average latency that triggers critical status.
    pub latency_critical: Duration,
    /// Lifetime failure percentage that triggers a warning.
    pub failure_warning_pct: f64,
    /// Lifetime failure percentage that triggers critical status.
    pub failure_critical_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            latency_warning: Duration::from_millis(250),
            latency_critical: Duration::from_secs(1),
            failure_warning_pct: 5.0,
            failure_critical_pct: 20.0,
        }
    }
}

/// Health status for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "OK",
            HealthStatus::Warning => "WARN",
            HealthStatus::Critical => "CRIT",
        }
    }
}

/// One worker with derived statistics and health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRow {
    pub id: String,
    pub url: String,
    pub online: bool,
    pub reported_weight: f64,
    pub manual_weight: Option<f64>,
    pub auto_weight: Option<f64>,
    pub effective_weight: f64,
    pub assigned: u64,
    pub assigned_pct: f64,
    pub ok: u64,
    pub fail: u64,
    /// Lifetime failures as a percentage of completed requests.
    pub failure_pct: f64,
    pub avg_latency_ms: f64,
    pub last_error: Option<String>,
    /// Seconds since the last successful probe, relative to frame arrival.
    pub last_seen_age_secs: Option<f64>,
    pub health: HealthStatus,
    /// Which thresholds were crossed.
    pub issues: Vec<&'static str>,
}

/// Everything the UI shows for one frame.
#[derive(Debug, Clone)]
pub struct ConsoleData {
    pub sequence: u64,
    pub received_at_ms: u64,
    pub transport: TransportMode,
    pub weight_mode: WeightMode,
    pub total_assigned: u64,
    pub total_ok: u64,
    pub total_fail: u64,
    /// Workers in the order the balancer reports them.
    pub workers: Vec<WorkerRow>,
    pub charts: ChartData,
    pub last_updated: Instant,
}

/// Health tallies across all workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub online: usize,
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
}

impl ConsoleData {
    /// Build the console model for a published frame.
    pub fn from_frame(frame: &FeedFrame, thresholds: &Thresholds) -> Self {
        let now_secs = frame.received_at_ms as f64 / 1000.0;
        let snapshot = &frame.snapshot;

        let workers = snapshot
            .workers
            .iter()
            .map(|w| {
                let failure_pct = failure_pct(w.ok, w.fail);
                let (health, issues) =
                    Self::compute_status(w.online, failure_pct, w.avg_latency_ms, thresholds);
                WorkerRow {
                    id: w.id.clone(),
                    url: w.url.clone(),
                    online: w.online,
                    reported_weight: w.reported_weight,
                    manual_weight: w.manual_weight,
                    auto_weight: w.auto_weight,
                    effective_weight: w.effective_weight,
                    assigned: w.assigned,
                    assigned_pct: w.assigned_pct,
                    ok: w.ok,
                    fail: w.fail,
                    failure_pct,
                    avg_latency_ms: w.avg_latency_ms,
                    last_error: w.last_error.clone().filter(|e| !e.is_empty()),
                    last_seen_age_secs: w.last_seen.map(|seen| (now_secs - seen).max(0.0)),
                    health,
                    issues,
                }
            })
            .collect();

        Self {
            sequence: frame.sequence,
            received_at_ms: frame.received_at_ms,
            transport: frame.transport,
            weight_mode: snapshot.weight_mode,
            total_assigned: snapshot.total_assigned,
            total_ok: snapshot.total_ok,
            total_fail: snapshot.total_fail,
            workers,
            charts: frame.charts.clone(),
            last_updated: Instant::now(),
        }
    }

    fn compute_status(
        online: bool,
        failure_pct: f64,
        avg_latency_ms: f64,
        thresholds: &Thresholds,
    ) -> (HealthStatus, Vec<&'static str>) {
        let mut health = HealthStatus::Healthy;
        let mut issues = Vec::new();

        if !online {
            health = HealthStatus::Critical;
            issues.push("offline");
        }

        let failure_status = if failure_pct >= thresholds.failure_critical_pct {
            HealthStatus::Critical
        } else if failure_pct >= thresholds.failure_warning_pct {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };
        if failure_status != HealthStatus::Healthy {
            issues.push("failure rate");
        }

        let latency = millis_to_duration(avg_latency_ms);
        let latency_status = if latency >= thresholds.latency_critical {
            HealthStatus::Critical
        } else if latency >= thresholds.latency_warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };
        if latency_status != HealthStatus::Healthy {
            issues.push("latency");
        }

        (health.max(failure_status).max(latency_status), issues)
    }

    pub fn counts(&self) -> HealthCounts {
        let mut counts = HealthCounts::default();
        for worker in &self.workers {
            if worker.online {
                counts.online += 1;
            }
            match worker.health {
                HealthStatus::Healthy => counts.healthy += 1,
                HealthStatus::Warning => counts.warning += 1,
                HealthStatus::Critical => counts.critical += 1,
            }
        }
        counts
    }

    /// Aggregate failure percentage since the last reset.
    pub fn overall_failure_pct(&self) -> f64 {
        failure_pct(self.total_ok, self.total_fail)
    }

    pub fn worker(&self, id: &str) -> Option<&WorkerRow> {
        self.workers.iter().find(|w| w.id == id)
    }

    /// Pretty JSON of the current state and chart window.
    pub fn export_json(&self) -> Result<String> {
        let export = Export {
            received_at_ms: self.received_at_ms,
            sequence: self.sequence,
            transport: self.transport,
            weight_mode: self.weight_mode,
            totals: Totals {
                assigned: self.total_assigned,
                ok: self.total_ok,
                fail: self.total_fail,
                failure_pct: self.overall_failure_pct(),
            },
            summary: self.counts(),
            workers: &self.workers,
            charts: &self.charts,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Write [`export_json`](Self::export_json) to `path`.
    pub fn export(&self, path: &Path) -> Result<()> {
        fs::write(path, self.export_json()?)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Totals {
    assigned: u64,
    ok: u64,
    fail: u64,
    failure_pct: f64,
}

#[derive(Serialize)]
struct Export<'a> {
    received_at_ms: u64,
    sequence: u64,
    transport: TransportMode,
    weight_mode: WeightMode,
    totals: Totals,
    summary: HealthCounts,
    workers: &'a [WorkerRow],
    charts: &'a ChartData,
}

fn failure_pct(ok: u64, fail: u64) -> f64 {
    let completed = ok + fail;
    if completed == 0 {
        0.0
    } else {
        fail as f64 / completed as f64 * 100.0
    }
}

fn millis_to_duration(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        // Saturates instead of panicking on absurd readings.
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{StateSnapshot, WorkerSnapshot};

    fn worker(id: &str) -> WorkerSnapshot {
        WorkerSnapshot {
            id: id.to_string(),
            url: format!("http://{}:8000", id),
            online: true,
            ok: 100,
            avg_latency_ms: 20.0,
            ..Default::default()
        }
    }

    fn frame(workers: Vec<WorkerSnapshot>) -> FeedFrame {
        let snapshot = StateSnapshot {
            total_assigned: 200,
            total_ok: 190,
            total_fail: 10,
            workers,
            ..Default::default()
        };
        FeedFrame::single(snapshot, 10_000, TransportMode::Push, 60_000)
    }

    #[test]
    fn test_healthy_worker() {
        let data = ConsoleData::from_frame(&frame(vec![worker("w1")]), &Thresholds::default());
        let row = &data.workers[0];
        assert_eq!(row.health, HealthStatus::Healthy);
        assert!(row.issues.is_empty());
        assert_eq!(row.failure_pct, 0.0);
    }

    #[test]
    fn test_offline_is_critical() {
        let mut w = worker("w1");
        w.online = false;
        let data = ConsoleData::from_frame(&frame(vec![w]), &Thresholds::default());
        assert_eq!(data.workers[0].health, HealthStatus::Critical);
        assert_eq!(data.workers[0].issues, vec!["offline"]);
    }

    #[test]
    fn test_failure_thresholds() {
        let mut warn = worker("warn");
        warn.ok = 90;
        warn.fail = 10;
        let mut crit = worker("crit");
        crit.ok = 50;
        crit.fail = 50;

        let data = ConsoleData::from_frame(&frame(vec![warn, crit]), &Thresholds::default());
        assert_eq!(data.worker("warn").unwrap().health, HealthStatus::Warning);
        assert_eq!(data.worker("warn").unwrap().failure_pct, 10.0);
        assert_eq!(data.worker("crit").unwrap().health, HealthStatus::Critical);
    }

    #[test]
    fn test_latency_thresholds_worst_wins() {
        let mut slow = worker("slow");
        slow.avg_latency_ms = 300.0;
        let mut slower = worker("slower");
        slower.avg_latency_ms = 1500.0;
        slower.ok = 95;
        slower.fail = 5;

        let data = ConsoleData::from_frame(&frame(vec![slow, slower]), &Thresholds::default());
        assert_eq!(data.worker("slow").unwrap().health, HealthStatus::Warning);
        let slower = data.worker("slower").unwrap();
        assert_eq!(slower.health, HealthStatus::Critical);
        assert_eq!(slower.issues, vec!["failure rate", "latency"]);
    }

    #[test]
    fn test_huge_latency_is_critical() {
        let mut stuck = worker("stuck");
        stuck.avg_latency_ms = 1e30;

        let data = ConsoleData::from_frame(&frame(vec![stuck]), &Thresholds::default());
        let row = data.worker("stuck").unwrap();
        assert_eq!(row.health, HealthStatus::Critical);
        assert_eq!(row.issues, vec!["latency"]);
        assert_eq!(millis_to_duration(f64::MAX), Duration::MAX);
    }

    #[test]
    fn test_last_seen_age_and_counts() {
        let mut seen = worker("seen");
        seen.last_seen = Some(7.5);
        let mut down = worker("down");
        down.online = false;
        down.last_error = Some(String::new());

        let data = ConsoleData::from_frame(&frame(vec![seen, down]), &Thresholds::default());
        assert_eq!(data.worker("seen").unwrap().last_seen_age_secs, Some(2.5));
        assert_eq!(data.worker("down").unwrap().last_error, None);

        let counts = data.counts();
        assert_eq!(counts.online, 1);
        assert_eq!(counts.healthy, 1);
        assert_eq!(counts.critical, 1);
        assert_eq!(data.overall_failure_pct(), 5.0);
    }

    #[test]
    fn test_export_json() {
        let data = ConsoleData::from_frame(&frame(vec![worker("w1")]), &Thresholds::default());
        let json: serde_json::Value = serde_json::from_str(&data.export_json().unwrap()).unwrap();

        assert_eq!(json["transport"], "push");
        assert_eq!(json["weight_mode"], "manual");
        assert_eq!(json["totals"]["assigned"], 200);
        assert_eq!(json["workers"][0]["id"], "w1");
        assert_eq!(json["workers"][0]["health"], "healthy");
        assert_eq!(json["charts"]["window_ms"], 60_000);
        assert_eq!(json["charts"]["workers"][0][0], "w1");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let data = ConsoleData::from_frame(&frame(vec![worker("w1")]), &Thresholds::default());

        data.export(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"w1\""));
    }
}
