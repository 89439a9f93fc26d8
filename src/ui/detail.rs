//! Detail overlay rendering.
//!
//! Displays a modal overlay with everything known about the selected worker,
//! plus its share and latency over the window.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Sparkline},
    Frame,
};

use super::common::format_count;
use super::workers::format_weight;
use crate::app::App;
use crate::data::duration::format_age;
use crate::data::{HealthStatus, Series};

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 16;

/// Render the worker detail as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    // Skip rendering if terminal is too small for the overlay
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    let Some(ref data) = app.data else {
        return;
    };
    let Some(worker) = app.selected_worker() else {
        return;
    };

    let overlay_width = (area.width * 90 / 100).clamp(MIN_OVERLAY_WIDTH, 90);
    let overlay_height = (area.height * 80 / 100).clamp(MIN_OVERLAY_HEIGHT, 24);

    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let chunks = Layout::vertical([
        Constraint::Length(10), // Worker info
        Constraint::Min(6),     // Sparklines
        Constraint::Length(1),  // Footer
    ])
    .split(overlay_area);

    // ===== INFO SECTION =====
    let health_style = app.theme.status_style(worker.health);
    let health_label = match worker.health {
        HealthStatus::Healthy => "Healthy",
        HealthStatus::Warning => "Warning",
        HealthStatus::Critical => "Critical",
    };
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut status_spans = vec![
        Span::raw(" Status: "),
        Span::styled(
            format!("{} {}", worker.health.symbol(), health_label),
            health_style.add_modifier(Modifier::BOLD),
        ),
    ];
    if !worker.issues.is_empty() {
        status_spans.push(Span::raw(format!("  ({})", worker.issues.join(", "))));
    }

    let info_lines = vec![
        Line::from(vec![Span::styled(format!(" {} ", worker.id), bold)]),
        Line::from(format!(" {}", worker.url)),
        Line::from(status_spans),
        Line::from(vec![
            Span::raw(" Online: "),
            Span::styled(if worker.online { "yes" } else { "no" }, bold),
            Span::raw("    Last seen: "),
            Span::raw(worker.last_seen_age_secs.map(format_age).unwrap_or_else(|| "never".into())),
        ]),
        Line::from(vec![
            Span::raw(" Weight: "),
            Span::styled(format_weight(worker), bold),
            Span::raw(format!(
                "    Reported: {:.2}    Mode: {}",
                worker.reported_weight,
                data.weight_mode.label()
            )),
        ]),
        Line::from(vec![
            Span::raw(" Assigned: "),
            Span::styled(format_count(worker.assigned), bold),
            Span::raw(format!(" ({:.1}%)", worker.assigned_pct)),
            Span::raw("    OK: "),
            Span::styled(format_count(worker.ok), bold),
            Span::raw("    Fail: "),
            Span::styled(format_count(worker.fail), bold),
            Span::raw(format!(" ({:.1}%)", worker.failure_pct)),
        ]),
        Line::from(vec![
            Span::raw(" Avg latency: "),
            Span::styled(format!("{:.1}ms", worker.avg_latency_ms), bold),
        ]),
        Line::from(vec![
            Span::raw(" Last error: "),
            Span::raw(worker.last_error.clone().unwrap_or_else(|| "-".to_string())),
        ]),
    ];

    let info_block = Block::default()
        .title(" Worker Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));
    frame.render_widget(Paragraph::new(info_lines).block(info_block), chunks[0]);

    // ===== SPARKLINES =====
    let spark_chunks =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(chunks[1]);

    match data.charts.worker(&worker.id) {
        Some(series) => {
            render_sparkline(frame, app, spark_chunks[0], " Share (%) ", &series.share);
            render_sparkline(frame, app, spark_chunks[1], " Latency (ms) ", &series.latency);
        }
        None => {
            let empty = Paragraph::new(Span::styled(
                "  No samples in window",
                Style::default().add_modifier(Modifier::DIM),
            ))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(app.theme.border_type)
                    .border_style(Style::default().fg(app.theme.border)),
            );
            frame.render_widget(empty, chunks[1]);
        }
    }

    // ===== FOOTER =====
    let footer = Paragraph::new(Line::from(vec![Span::styled(
        " ↑↓: previous/next worker   Esc: close ",
        Style::default().add_modifier(Modifier::DIM),
    )]));
    frame.render_widget(footer, chunks[2]);
}

fn render_sparkline(frame: &mut Frame, app: &App, area: Rect, title: &str, series: &Series) {
    // Sparklines take integers; scale so one decimal survives.
    let values: Vec<u64> = series.points().map(|p| (p.value * 10.0).round() as u64).collect();
    let width = area.width.saturating_sub(2) as usize;
    let visible = &values[values.len().saturating_sub(width)..];

    let current = series.last().map(|p| format!("{:.1}", p.value)).unwrap_or_else(|| "-".into());

    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .title(format!("{}{} ", title, current))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .data(visible)
        .style(Style::default().fg(app.theme.highlight));

    frame.render_widget(sparkline, area);
}
