// Binary includes library modules - some public API items are only for library consumers
#![allow(unused)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::info;

mod app;
mod config;
mod data;
mod error;
mod events;
mod logging;
mod source;
mod ui;

use app::{App, View};
use config::{ConsoleConfig, Settings};
use source::{
    now_ms, DataSource, FeedFrame, HttpStateFetcher, LiveFeed, PushSocket, StateFetcher,
    StreamOrchestrator, TransportMode,
};

#[derive(Parser, Debug)]
#[command(name = "lb-console")]
#[command(about = "Live operations console for a load-balancing test harness")]
struct Args {
    /// Base HTTP URL of the load balancer (e.g. http://localhost:8000)
    #[arg(short, long)]
    url: Option<String>,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Close the push stream after this long without a frame (e.g., "4s")
    #[arg(long)]
    stale_after: Option<String>,

    /// Trailing chart window (e.g., "120s", "5m")
    #[arg(short, long)]
    window: Option<String>,

    /// Average latency warning threshold (e.g., "250ms")
    #[arg(long)]
    latency_warn: Option<String>,

    /// Average latency critical threshold (e.g., "1s")
    #[arg(long)]
    latency_crit: Option<String>,

    /// Failure percentage warning threshold
    #[arg(long)]
    fail_warn: Option<f64>,

    /// Failure percentage critical threshold
    #[arg(long)]
    fail_crit: Option<f64>,

    /// Write logs to this file (filter with LB_CONSOLE_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Fetch the current state once, export it to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

impl Args {
    /// Flags that were given, as settings keys.
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(ref url) = self.url {
            overrides.push(("base_url", url.clone()));
        }
        if let Some(ref stale) = self.stale_after {
            overrides.push(("stale_after", stale.clone()));
        }
        if let Some(ref window) = self.window {
            overrides.push(("window", window.clone()));
        }
        if let Some(ref warn) = self.latency_warn {
            overrides.push(("thresholds.latency_warning", warn.clone()));
        }
        if let Some(ref crit) = self.latency_crit {
            overrides.push(("thresholds.latency_critical", crit.clone()));
        }
        if let Some(warn) = self.fail_warn {
            overrides.push(("thresholds.failure_warning_pct", warn.to_string()));
        }
        if let Some(crit) = self.fail_crit {
            overrides.push(("thresholds.failure_critical_pct", crit.to_string()));
        }
        overrides
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = args.overrides();
    let settings = Settings::load(args.config.as_deref(), &overrides)?;
    let config = settings.resolve().context("Invalid settings")?;

    let _log_guard = match args.log_file {
        Some(ref path) => Some(logging::init_file_logging(path)?),
        None => None,
    };

    let rt = tokio::runtime::Runtime::new()?;

    // Handle export mode (non-interactive)
    if let Some(ref export_path) = args.export {
        return export_to_file(&rt, &config, export_path);
    }

    run_live(&rt, config)
}

/// Follow the balancer over push with pull fallback.
fn run_live(rt: &tokio::runtime::Runtime, config: ConsoleConfig) -> Result<()> {
    info!(
        stream = %config.stream_url,
        state = %config.state_url,
        "Starting console"
    );

    let fetcher = HttpStateFetcher::new(config.state_url.clone(), config.request_timeout)?;
    let feed = rt.block_on(async {
        let socket = PushSocket::new(config.stream_url.clone(), config.stale_after);
        let orchestrator = StreamOrchestrator::new(
            socket,
            Arc::new(fetcher),
            config.reconnect.clone(),
            config.poll_interval,
        );
        LiveFeed::spawn(orchestrator, config.window_ms)
    });

    // Run the TUI in the main thread while the async runtime runs in the background
    let result = run_tui(
        Box::new(feed.subscribe()),
        config.thresholds.clone(),
        config.export_path.clone(),
        config.refresh,
    );

    // Signal shutdown
    feed.shutdown();
    info!("Console stopped");

    result
}

/// Run the TUI with the given data source
fn run_tui(
    source: Box<dyn DataSource>,
    thresholds: data::Thresholds,
    export_path: PathBuf,
    refresh_interval: Duration,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Create app and load initial data
    let mut app = App::new(source, thresholds).with_export_path(export_path);
    let _ = app.reload_data();

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, refresh_interval);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();

    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                ui::common::render_too_small(frame, area, MIN_WIDTH, MIN_HEIGHT);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Tabs
                Constraint::Min(8),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_tabs(frame, app, chunks[1]);

            match app.current_view {
                View::Workers => ui::workers::render(frame, app, chunks[2]),
                View::Charts => ui::charts::render(frame, app, chunks[2]),
            }

            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_detail_overlay {
                ui::detail::render_overlay(frame, app, area);
            }

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        // Poll for events with a short timeout
        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => {
                    // Content starts after header (1) + tabs (1) + table header (1)
                    events::handle_mouse_event(app, mouse, 3);
                }
                _ => {}
            }
        }

        if last_refresh.elapsed() >= refresh_interval {
            let _ = app.reload_data();
            last_refresh = Instant::now();
        }
    }

    Ok(())
}

/// Fetch the state once and export it to a JSON file
fn export_to_file(rt: &tokio::runtime::Runtime, config: &ConsoleConfig, path: &Path) -> Result<()> {
    let fetcher = HttpStateFetcher::new(config.state_url.clone(), config.request_timeout)?;
    let snapshot = rt
        .block_on(fetcher.fetch_state())
        .with_context(|| format!("Failed to fetch {}", config.state_url))?;

    let frame = FeedFrame::single(snapshot, now_ms(), TransportMode::Pull, config.window_ms);
    let data = data::ConsoleData::from_frame(&frame, &config.thresholds);
    data.export(path)?;

    println!("Exported console state to: {}", path.display());
    Ok(())
}
