//! Charts view rendering.
//!
//! Four line charts over the trailing window, x axis in seconds before the
//! latest sample:
//!
//! ```text
//! ┌ Throughput (req/s) ──┐┌ Failure rate (%) ────┐
//! └──────────────────────┘└──────────────────────┘
//! ┌ Share (%) ───────────┐┌ Latency (ms) ────────┐
//! └──────────────────────┘└──────────────────────┘
//! ```

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::{ChartData, Series};

/// A named line on a chart.
struct Plot {
    name: String,
    points: Vec<(f64, f64)>,
    style: Style,
}

/// Render the Charts view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.data else {
        return;
    };
    let charts = &data.charts;

    let Some(latest) = charts.latest_ms else {
        render_empty(frame, app, area);
        return;
    };

    let halves = [Constraint::Percentage(50), Constraint::Percentage(50)];
    let rows = Layout::vertical(halves).split(area);
    let top = Layout::horizontal(halves).split(rows[0]);
    let bottom = Layout::horizontal(halves).split(rows[1]);

    let highlight = Style::default().fg(app.theme.highlight);
    let failure = Style::default().fg(app.theme.critical);

    render_chart(
        frame,
        app,
        top[0],
        "Throughput (req/s)",
        charts,
        vec![plot("throughput", &charts.throughput, latest, highlight)],
        None,
    );
    render_chart(
        frame,
        app,
        top[1],
        "Failure rate (%)",
        charts,
        vec![plot("failure %", &charts.failure_rate, latest, failure)],
        Some(100.0),
    );

    let share = charts
        .workers
        .iter()
        .enumerate()
        .map(|(i, (id, series))| {
            plot(id, &series.share, latest, Style::default().fg(app.theme.series_color(i)))
        })
        .collect();
    render_chart(frame, app, bottom[0], "Share (%)", charts, share, Some(100.0));

    let latency = charts
        .workers
        .iter()
        .enumerate()
        .map(|(i, (id, series))| {
            plot(id, &series.latency, latest, Style::default().fg(app.theme.series_color(i)))
        })
        .collect();
    render_chart(frame, app, bottom[1], "Latency (ms)", charts, latency, None);
}

fn plot(name: &str, series: &Series, latest_ms: u64, style: Style) -> Plot {
    Plot {
        name: name.to_string(),
        points: series.to_chart_points(latest_ms),
        style,
    }
}

fn render_chart(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    title: &str,
    charts: &ChartData,
    plots: Vec<Plot>,
    fixed_max: Option<f64>,
) {
    let window_secs = charts.window_ms as f64 / 1000.0;

    let y_max = fixed_max.unwrap_or_else(|| {
        let max = plots
            .iter()
            .flat_map(|l| l.points.iter().map(|(_, y)| *y))
            .fold(0.0, f64::max);
        nice_ceiling(max)
    });

    let datasets: Vec<Dataset> = plots
        .iter()
        .map(|l| {
            Dataset::default()
                .name(l.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(l.style)
                .data(&l.points)
        })
        .collect();

    let label_style = Style::default().add_modifier(Modifier::DIM);
    let x_axis = Axis::default()
        .style(Style::default().fg(app.theme.border))
        .bounds([-window_secs, 0.0])
        .labels(vec![
            Span::styled(format!("-{:.0}s", window_secs), label_style),
            Span::styled(format!("-{:.0}s", window_secs / 2.0), label_style),
            Span::styled("now", label_style),
        ]);
    let y_axis = Axis::default()
        .style(Style::default().fg(app.theme.border))
        .bounds([0.0, y_max])
        .labels(vec![
            Span::styled("0", label_style),
            Span::styled(format_axis(y_max / 2.0), label_style),
            Span::styled(format_axis(y_max), label_style),
        ]);

    // Single-series charts show the current value in the title.
    let latest = plots
        .first()
        .filter(|_| plots.len() == 1)
        .and_then(|l| l.points.last())
        .map(|(_, y)| format!(" {} ", format_axis(*y)))
        .unwrap_or_default();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(format!(" {} {}", title, latest))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .x_axis(x_axis)
        .y_axis(y_axis)
        .hidden_legend_constraints((Constraint::Ratio(1, 3), Constraint::Ratio(1, 2)));

    frame.render_widget(chart, area);
}

fn render_empty(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Charts ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    let text = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Waiting for samples",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ])
    .block(block);
    frame.render_widget(text, area);
}

/// Round an axis maximum up to 1, 2 or 5 times a power of ten.
fn nice_ceiling(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(value.log10().floor());
    for step in [1.0, 2.0, 5.0, 10.0] {
        if value <= step * magnitude {
            return step * magnitude;
        }
    }
    10.0 * magnitude
}

fn format_axis(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.1}K", value / 1000.0)
    } else if value >= 10.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nice_ceiling() {
        assert_eq!(nice_ceiling(0.0), 1.0);
        assert_eq!(nice_ceiling(f64::NAN), 1.0);
        assert_eq!(nice_ceiling(7.0), 10.0);
        assert_eq!(nice_ceiling(12.0), 20.0);
        assert_eq!(nice_ceiling(45.0), 50.0);
        assert_eq!(nice_ceiling(100.0), 100.0);
    }

    #[test]
    fn test_format_axis() {
        assert_eq!(format_axis(2.5), "2.5");
        assert_eq!(format_axis(42.0), "42");
        assert_eq!(format_axis(1500.0), "1.5K");
    }
}
