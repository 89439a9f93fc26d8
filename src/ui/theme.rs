//! Light and dark palettes, picked from the terminal background.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::HealthStatus;
use crate::source::{ConnectionStatus, TransportMode};

/// Colors and styles shared by every view.
///
/// [`Theme::auto_detect()`] chooses between [`Theme::dark()`] and
/// [`Theme::light()`] from the terminal's background luminance.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent for active tabs, overlay borders and single-series charts.
    pub highlight: Color,
    pub warning: Color,
    pub critical: Color,
    pub healthy: Color,
    /// Borders, axes and separators.
    pub border: Color,
    /// Table header rows.
    pub header: Style,
    /// The row under the cursor.
    pub selected: Style,
    pub tab_active: Style,
    pub tab_inactive: Style,
    pub border_type: BorderType,
    /// Line colors for per-worker chart series, cycled in worker order.
    pub series: Vec<Color>,
}

impl Theme {
    /// Palette for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self::with_accent(
            Color::Cyan,
            Color::Gray,
            Color::DarkGray,
            vec![
                Color::Cyan,
                Color::Magenta,
                Color::Yellow,
                Color::Green,
                Color::LightBlue,
                Color::LightRed,
            ],
        )
    }

    /// Palette for light terminal backgrounds.
    pub fn light() -> Self {
        Self::with_accent(
            Color::Blue,
            Color::DarkGray,
            Color::LightBlue,
            vec![
                Color::Blue,
                Color::Magenta,
                Color::Red,
                Color::Green,
                Color::DarkGray,
                Color::Cyan,
            ],
        )
    }

    fn with_accent(accent: Color, muted: Color, selection: Color, series: Vec<Color>) -> Self {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        Self {
            highlight: accent,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: muted,
            header: bold.fg(accent),
            selected: bold.bg(selection),
            tab_active: bold.fg(accent),
            tab_inactive: Style::default().fg(muted),
            border_type: BorderType::Rounded,
            series,
        }
    }

    /// Light palette on bright backgrounds, dark otherwise (including when
    /// the terminal does not answer).
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn status_style(&self, status: HealthStatus) -> Style {
        match status {
            HealthStatus::Healthy => Style::default().fg(self.healthy),
            HealthStatus::Warning => Style::default().fg(self.warning),
            HealthStatus::Critical => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    /// Push connection status: connecting reads as a warning, any
    /// disconnect as critical.
    pub fn link_style(&self, status: &ConnectionStatus) -> Style {
        let health = match status {
            ConnectionStatus::Connected => HealthStatus::Healthy,
            ConnectionStatus::Connecting => HealthStatus::Warning,
            ConnectionStatus::Disconnected(_) => HealthStatus::Critical,
        };
        self.status_style(health)
    }

    /// Polling is the degraded mode.
    pub fn mode_style(&self, mode: TransportMode) -> Style {
        match mode {
            TransportMode::Push => self.status_style(HealthStatus::Healthy),
            TransportMode::Pull => self.status_style(HealthStatus::Warning),
        }
    }

    /// Line color for the `index`-th worker series.
    pub fn series_color(&self, index: usize) -> Color {
        if self.series.is_empty() {
            return self.highlight;
        }
        self.series[index % self.series.len()]
    }
}
