//! Workers view rendering.
//!
//! Displays a table of all workers with weights, traffic, latency and
//! health status.

use std::cmp::Ordering;

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use super::common::format_count;
use crate::app::App;
use crate::data::{HealthStatus, WorkerRow};

/// Column to sort by in the Workers view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    /// Sort by worker id alphabetically.
    #[default]
    Id,
    /// Sort by effective weight.
    Weight,
    /// Sort by assignment count.
    Assigned,
    /// Sort by lifetime failure percentage.
    Failures,
    /// Sort by average latency.
    Latency,
    /// Sort by health status.
    Status,
}

impl SortColumn {
    /// Cycle to the next sort column.
    pub fn next(self) -> Self {
        match self {
            SortColumn::Id => SortColumn::Weight,
            SortColumn::Weight => SortColumn::Assigned,
            SortColumn::Assigned => SortColumn::Failures,
            SortColumn::Failures => SortColumn::Latency,
            SortColumn::Latency => SortColumn::Status,
            SortColumn::Status => SortColumn::Id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Weight => "weight",
            SortColumn::Assigned => "assigned",
            SortColumn::Failures => "fail%",
            SortColumn::Latency => "latency",
            SortColumn::Status => "status",
        }
    }
}

/// Render the Workers view as a sortable table.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.data else {
        return;
    };

    let workers = app.visible_workers();

    let header = Row::new(vec![
        Cell::from(format_header("Worker", SortColumn::Id, app)),
        Cell::from("Up"),
        Cell::from(format_header("Weight", SortColumn::Weight, app)),
        Cell::from(format_header("Assigned", SortColumn::Assigned, app)),
        Cell::from("Share"),
        Cell::from("OK"),
        Cell::from(format_header("Fail", SortColumn::Failures, app)),
        Cell::from(format_header("Latency", SortColumn::Latency, app)),
        Cell::from("Last error"),
        Cell::from(format_header("Status", SortColumn::Status, app)),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = workers
        .iter()
        .map(|w| {
            let status_style = app.theme.status_style(w.health);
            let up_style = if w.online {
                app.theme.status_style(HealthStatus::Healthy)
            } else {
                app.theme.status_style(HealthStatus::Critical)
            };

            let latency_style = threshold_style(
                app,
                w.avg_latency_ms,
                app.thresholds.latency_warning.as_secs_f64() * 1000.0,
                app.thresholds.latency_critical.as_secs_f64() * 1000.0,
            );
            let fail_style = threshold_style(
                app,
                w.failure_pct,
                app.thresholds.failure_warning_pct,
                app.thresholds.failure_critical_pct,
            );

            Row::new(vec![
                Cell::from(w.id.clone()),
                Cell::from(if w.online { "yes" } else { "no" }).style(up_style),
                Cell::from(format_weight(w)),
                Cell::from(format_count(w.assigned)),
                Cell::from(format!("{:.1}%", w.assigned_pct)),
                Cell::from(format_count(w.ok)),
                Cell::from(format!("{} ({:.1}%)", format_count(w.fail), w.failure_pct))
                    .style(fail_style),
                Cell::from(format!("{:.1}ms", w.avg_latency_ms)).style(latency_style),
                Cell::from(w.last_error.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(w.health.symbol()).style(status_style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),  // Worker
        Constraint::Min(4),   // Up
        Constraint::Fill(1),  // Weight
        Constraint::Fill(1),  // Assigned
        Constraint::Min(7),   // Share
        Constraint::Fill(1),  // OK
        Constraint::Fill(1),  // Fail
        Constraint::Fill(1),  // Latency
        Constraint::Fill(2),  // Last error
        Constraint::Min(6),   // Status
    ];

    let selected_visual_index = app.selected_worker_index.min(workers.len().saturating_sub(1));
    let sort_dir = if app.sort_ascending { "↑" } else { "↓" };

    // Build title with filter info
    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let position_info = if !workers.is_empty() {
        format!(" [{}/{}]", selected_visual_index + 1, workers.len())
    } else {
        String::new()
    };

    let title = format!(
        " Workers ({}/{}) [s:sort {}{}]{}{} ",
        workers.len(),
        data.workers.len(),
        app.sort_column.label(),
        sort_dir,
        filter_info,
        position_info
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(selected_visual_index));

    frame.render_stateful_widget(table, area, &mut state);
}

fn format_header(name: &str, col: SortColumn, app: &App) -> Span<'static> {
    if app.sort_column == col {
        let arrow = if app.sort_ascending { "↑" } else { "↓" };
        Span::raw(format!("{}{}", name, arrow))
    } else {
        Span::raw(name.to_string())
    }
}

fn threshold_style(app: &App, value: f64, warning: f64, critical: f64) -> Style {
    if value >= critical {
        app.theme.status_style(HealthStatus::Critical)
    } else if value >= warning {
        app.theme.status_style(HealthStatus::Warning)
    } else {
        Style::default()
    }
}

/// Effective weight, with the manual override or auto estimate it came from.
pub fn format_weight(worker: &WorkerRow) -> String {
    match (worker.manual_weight, worker.auto_weight) {
        (Some(manual), _) => format!("{:.2} (m {:.2})", worker.effective_weight, manual),
        (None, Some(auto)) => format!("{:.2} (a {:.2})", worker.effective_weight, auto),
        (None, None) => format!("{:.2}", worker.effective_weight),
    }
}

/// Sort workers by the given column and direction.
pub fn sort_workers_by(workers: &mut [&WorkerRow], column: SortColumn, ascending: bool) {
    workers.sort_by(|a, b| {
        let primary = match column {
            SortColumn::Id => a.id.cmp(&b.id),
            SortColumn::Weight => a.effective_weight.total_cmp(&b.effective_weight),
            SortColumn::Assigned => a.assigned.cmp(&b.assigned),
            SortColumn::Failures => a.failure_pct.total_cmp(&b.failure_pct),
            SortColumn::Latency => a.avg_latency_ms.total_cmp(&b.avg_latency_ms),
            SortColumn::Status => a.health.cmp(&b.health),
        };

        let primary = if ascending { primary } else { primary.reverse() };

        // Secondary sort by id for stability when primary values are equal
        if primary == Ordering::Equal {
            a.id.cmp(&b.id)
        } else {
            primary
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ConsoleData, Thresholds};
    use crate::source::{FeedFrame, StateSnapshot, TransportMode, WorkerSnapshot};

    fn data() -> ConsoleData {
        let worker = |id: &str, assigned: u64, latency: f64, weight: f64| WorkerSnapshot {
            id: id.to_string(),
            online: true,
            assigned,
            avg_latency_ms: latency,
            effective_weight: weight,
            ..Default::default()
        };
        let snapshot = StateSnapshot {
            workers: vec![
                worker("b", 30, 10.0, 1.0),
                worker("a", 10, 50.0, 3.0),
                worker("c", 20, 10.0, 2.0),
            ],
            ..Default::default()
        };
        let frame = FeedFrame::single(snapshot, 0, TransportMode::Pull, 1_000);
        ConsoleData::from_frame(&frame, &Thresholds::default())
    }

    fn ids(workers: &[&WorkerRow]) -> Vec<String> {
        workers.iter().map(|w| w.id.clone()).collect()
    }

    #[test]
    fn test_sort_columns() {
        let data = data();
        let mut workers: Vec<&WorkerRow> = data.workers.iter().collect();

        sort_workers_by(&mut workers, SortColumn::Id, true);
        assert_eq!(ids(&workers), ["a", "b", "c"]);

        sort_workers_by(&mut workers, SortColumn::Assigned, false);
        assert_eq!(ids(&workers), ["b", "c", "a"]);

        sort_workers_by(&mut workers, SortColumn::Weight, true);
        assert_eq!(ids(&workers), ["b", "c", "a"]);

        // Ties fall back to id.
        sort_workers_by(&mut workers, SortColumn::Latency, true);
        assert_eq!(ids(&workers), ["b", "c", "a"]);
    }

    #[test]
    fn test_sort_column_cycle() {
        let mut column = SortColumn::default();
        for _ in 0..6 {
            column = column.next();
        }
        assert_eq!(column, SortColumn::Id);
    }

    #[test]
    fn test_format_weight() {
        let data = data();
        let mut row = data.workers[0].clone();
        assert_eq!(format_weight(&row), "1.00");
        row.manual_weight = Some(4.0);
        assert_eq!(format_weight(&row), "1.00 (m 4.00)");
    }
}
