//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::data::HealthStatus;

/// Render the header bar with link state and system health overview.
///
/// Displays: status indicator, push connection, transport mode, worker
/// counts by health, weight mode and totals.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let link_spans = vec![
        Span::styled(app.link.status.label(), app.theme.link_style(&app.link.status)),
        Span::raw(" "),
        Span::styled(
            format!("[{}]", app.link.mode.label()),
            app.theme.mode_style(app.link.mode),
        ),
    ];

    let Some(ref data) = app.data else {
        let mut spans = vec![
            Span::styled(" LB CONSOLE ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("│ "),
        ];
        spans.extend(link_spans);
        spans.push(Span::raw(" │ Waiting for state..."));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
        return;
    };

    let counts = data.counts();
    let total = data.workers.len();

    // Overall status indicator
    let status_style = if counts.critical > 0 {
        app.theme.status_style(HealthStatus::Critical)
    } else if counts.warning > 0 {
        app.theme.status_style(HealthStatus::Warning)
    } else {
        app.theme.status_style(HealthStatus::Healthy)
    };

    let mut spans = vec![
        Span::styled(" ● ", status_style),
        Span::styled("LB CONSOLE ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
    ];
    spans.extend(link_spans);
    spans.extend(vec![
        Span::raw(" │ "),
        Span::styled(format!("{}", counts.healthy), Style::default().fg(app.theme.healthy)),
        Span::raw(" ok "),
        if counts.warning > 0 {
            Span::styled(format!("{}", counts.warning), Style::default().fg(app.theme.warning))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" warn "),
        if counts.critical > 0 {
            Span::styled(
                format!("{}", counts.critical),
                Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" crit │ "),
        Span::styled(
            format!("{}/{}", counts.online, total),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" online │ "),
        Span::raw(format!("{} │ ", data.weight_mode.label())),
        Span::raw(format!(
            "A:{} OK:{} F:{} ({:.1}%)",
            format_count(data.total_assigned),
            format_count(data.total_ok),
            format_count(data.total_fail),
            data.overall_failure_pct(),
        )),
    ]);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Format a count for display (e.g., 1234 -> "1.2K", 1234567 -> "1.2M").
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![Line::from(" 1:Workers "), Line::from(" 2:Charts ")];

    let selected = match app.current_view {
        View::Workers => 0,
        View::Charts => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: current view, time since last frame, source, available controls.
/// Also displays temporary status messages.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    // Check for temporary status message first
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let status = if let Some(ref data) = app.data {
        let elapsed = data.last_updated.elapsed();

        let controls = match app.current_view {
            View::Workers => {
                if app.filter_active {
                    "Type to search | Enter:apply Esc:cancel"
                } else {
                    "/:search s:sort Tab:switch Enter:detail e:export ?:help q:quit"
                }
            }
            View::Charts => "Tab:switch e:export ?:help q:quit",
        };

        format!(
            " {} | #{} via {} | Updated {:.1}s ago | {}",
            app.current_view.label(),
            data.sequence,
            data.transport.label(),
            elapsed.as_secs_f64(),
            controls,
        )
    } else {
        format!(" {} | Connecting... | q:quit", app.source_description())
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(" Navigation", Style::default().add_modifier(Modifier::BOLD))]),
        Line::from("  ←/→ h/l     Switch views"),
        Line::from("  1/2         Workers / Charts"),
        Line::from("  ↑/↓ j/k     Navigate list"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       Worker detail"),
        Line::from("  Esc         Go back"),
        Line::from(""),
        Line::from(vec![Span::styled(" Workers", Style::default().add_modifier(Modifier::BOLD))]),
        Line::from("  /         Start filter/search"),
        Line::from("  c         Clear filter"),
        Line::from("  s         Cycle sort column"),
        Line::from("  S         Toggle sort direction"),
        Line::from(""),
        Line::from(vec![Span::styled(" General", Style::default().add_modifier(Modifier::BOLD))]),
        Line::from("  e         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 24u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    // Clear the area behind the help
    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

/// Warn that the terminal is below `min_width` x `min_height`.
pub fn render_too_small(frame: &mut Frame, area: Rect, min_width: u16, min_height: u16) {
    let msg = format!(
        "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
        area.width, area.height, min_width, min_height
    );
    let paragraph = Paragraph::new(msg)
        .alignment(ratatui::layout::Alignment::Center)
        .style(Style::default().fg(ratatui::style::Color::Yellow));
    frame.render_widget(paragraph, message_area(area));
}

/// A five-row band around the vertical middle of `area`, clipped to it.
pub fn message_area(area: Rect) -> Rect {
    let height = 5u16.min(area.height);
    let y = area.y + (area.height / 2).saturating_sub(2).min(area.height - height);
    Rect::new(area.x, y, area.width, height)
}
