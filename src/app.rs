//! Application state and navigation logic.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::data::{ConsoleData, Thresholds, WorkerRow};
use crate::source::{DataSource, LinkState};
use crate::ui::workers::{sort_workers_by, SortColumn};
use crate::ui::Theme;

/// Default path for the `e` key export.
pub const DEFAULT_EXPORT_PATH: &str = "lb_console_export.json";

/// The current view/tab in the TUI.
///
/// Worker detail is shown as an overlay (controlled by `App::show_detail_overlay`)
/// rather than as a separate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Table of all workers with health status.
    Workers,
    /// Throughput, failure rate, share and latency over the window.
    Charts,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Workers => View::Charts,
            View::Charts => View::Workers,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        // Two views: same as next.
        self.next()
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Workers => "Workers",
            View::Charts => "Charts",
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    pub show_detail_overlay: bool,

    // Data source
    source: Box<dyn DataSource>,
    pub data: Option<ConsoleData>,
    pub link: LinkState,
    pub thresholds: Thresholds,

    // Navigation state (visual index into the sorted, filtered table)
    pub selected_worker_index: usize,

    // Sorting (Workers view)
    pub sort_column: SortColumn,
    pub sort_ascending: bool,

    // Search/filter
    pub filter_text: String,
    pub filter_active: bool,

    // UI
    pub theme: Theme,
    pub export_path: PathBuf,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App with the given data source and thresholds.
    pub fn new(source: Box<dyn DataSource>, thresholds: Thresholds) -> Self {
        Self::with_theme(source, thresholds, Theme::auto_detect())
    }

    /// Create a new App with an explicit theme.
    pub fn with_theme(source: Box<dyn DataSource>, thresholds: Thresholds, theme: Theme) -> Self {
        let link = source.link();
        Self {
            running: true,
            current_view: View::Workers,
            show_help: false,
            show_detail_overlay: false,
            source,
            data: None,
            link,
            thresholds,
            selected_worker_index: 0,
            sort_column: SortColumn::default(),
            sort_ascending: true,
            filter_text: String::new(),
            filter_active: false,
            theme,
            export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
            status_message: None,
        }
    }

    /// Set where the `e` key writes exports.
    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = path.into();
        self
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Poll the data source for new data.
    ///
    /// The link state is refreshed on every call. Returns true if a new frame
    /// was received.
    pub fn reload_data(&mut self) -> bool {
        self.link = self.source.link();

        let Some(frame) = self.source.poll() else {
            return false;
        };

        self.data = Some(ConsoleData::from_frame(&frame, &self.thresholds));

        // Clamp selection index
        let count = self.visible_worker_count();
        if self.selected_worker_index >= count {
            self.selected_worker_index = count.saturating_sub(1);
        }
        true
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.visible_worker_count().saturating_sub(1);
        self.selected_worker_index = (self.selected_worker_index + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        self.selected_worker_index = self.selected_worker_index.saturating_sub(n);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        self.selected_worker_index = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        self.selected_worker_index = self.visible_worker_count().saturating_sub(1);
    }

    /// Workers after filtering and sorting, in display order.
    pub fn visible_workers(&self) -> Vec<&WorkerRow> {
        let Some(ref data) = self.data else {
            return Vec::new();
        };
        let mut workers: Vec<&WorkerRow> =
            data.workers.iter().filter(|w| self.matches_filter(w)).collect();
        sort_workers_by(&mut workers, self.sort_column, self.sort_ascending);
        workers
    }

    fn visible_worker_count(&self) -> usize {
        match self.data {
            Some(ref data) => data.workers.iter().filter(|w| self.matches_filter(w)).count(),
            None => 0,
        }
    }

    /// The worker under the cursor.
    pub fn selected_worker(&self) -> Option<&WorkerRow> {
        self.visible_workers().get(self.selected_worker_index).copied()
    }

    /// Open the detail overlay for the currently selected worker.
    pub fn enter_detail(&mut self) {
        if self.current_view == View::Workers && self.selected_worker().is_some() {
            self.show_detail_overlay = true;
        }
    }

    /// Navigate back: close overlay first, then return to Workers.
    pub fn go_back(&mut self) {
        if self.show_detail_overlay {
            self.show_detail_overlay = false;
            return;
        }
        self.current_view = View::Workers;
    }

    /// Close the detail overlay if open.
    pub fn close_overlay(&mut self) {
        self.show_detail_overlay = false;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Cycle to the next sort column.
    pub fn cycle_sort(&mut self) {
        self.sort_column = self.sort_column.next();
    }

    /// Toggle sort direction between ascending and descending.
    pub fn toggle_sort_direction(&mut self) {
        self.sort_ascending = !self.sort_ascending;
    }

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.filter_active = false;
    }

    /// Clear the filter text and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.filter_active = false;
    }

    /// Append a character to the filter text.
    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
        self.selected_worker_index = 0;
    }

    /// Remove the last character from the filter text.
    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
    }

    /// Check if a worker matches the current filter (id or URL).
    pub fn matches_filter(&self, worker: &WorkerRow) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        let search = self.filter_text.to_lowercase();
        worker.id.to_lowercase().contains(&search) || worker.url.to_lowercase().contains(&search)
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the current state and chart window to a file.
    pub fn export_state(&self, path: &Path) -> Result<()> {
        let Some(ref data) = self.data else {
            anyhow::bail!("No data to export");
        };
        data.export(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{
        ConnectionStatus, FeedFrame, StateSnapshot, TransportMode, WorkerSnapshot,
    };
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct QueueSource {
        frames: VecDeque<Arc<FeedFrame>>,
    }

    impl DataSource for QueueSource {
        fn poll(&mut self) -> Option<Arc<FeedFrame>> {
            self.frames.pop_front()
        }

        fn description(&self) -> &str {
            "queue"
        }

        fn link(&self) -> LinkState {
            LinkState {
                status: ConnectionStatus::Connected,
                mode: TransportMode::Push,
            }
        }
    }

    fn frame(ids: &[&str]) -> Arc<FeedFrame> {
        let workers = ids
            .iter()
            .map(|id| WorkerSnapshot {
                id: id.to_string(),
                url: format!("http://{}:8000", id),
                online: true,
                ..Default::default()
            })
            .collect();
        let snapshot = StateSnapshot {
            workers,
            ..Default::default()
        };
        Arc::new(FeedFrame::single(snapshot, 1_000, TransportMode::Push, 60_000))
    }

    fn app(frames: Vec<Arc<FeedFrame>>) -> App {
        let source = QueueSource {
            frames: frames.into(),
        };
        App::with_theme(Box::new(source), Thresholds::default(), Theme::dark())
    }

    #[test]
    fn test_reload_data() {
        let mut app = app(vec![frame(&["w1", "w2"])]);
        assert!(app.data.is_none());

        assert!(app.reload_data());
        assert_eq!(app.data.as_ref().unwrap().workers.len(), 2);
        assert!(app.link.status.is_connected());

        // Nothing new: keep the last data.
        assert!(!app.reload_data());
        assert!(app.data.is_some());
    }

    #[test]
    fn test_selection_is_clamped() {
        let mut app = app(vec![frame(&["w1", "w2", "w3"]), frame(&["w1"])]);
        app.reload_data();

        app.select_next_n(10);
        assert_eq!(app.selected_worker_index, 2);
        app.select_prev();
        assert_eq!(app.selected_worker_index, 1);
        app.select_last();
        assert_eq!(app.selected_worker().unwrap().id, "w3");

        app.reload_data();
        assert_eq!(app.selected_worker_index, 0);
    }

    #[test]
    fn test_filter() {
        let mut app = app(vec![frame(&["alpha", "beta", "alphabet"])]);
        app.reload_data();

        app.start_filter();
        for c in "ALPHA".chars() {
            app.filter_push(c);
        }
        let ids: Vec<&str> = app.visible_workers().iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "alphabet"]);

        app.clear_filter();
        assert_eq!(app.visible_workers().len(), 3);
        assert!(!app.filter_active);
    }

    #[test]
    fn test_detail_and_back() {
        let mut app = app(vec![frame(&["w1"])]);

        // No data, no detail.
        app.enter_detail();
        assert!(!app.show_detail_overlay);

        app.reload_data();
        app.enter_detail();
        assert!(app.show_detail_overlay);

        app.go_back();
        assert!(!app.show_detail_overlay);

        app.set_view(View::Charts);
        app.go_back();
        assert_eq!(app.current_view, View::Workers);
    }

    #[test]
    fn test_view_cycle() {
        assert_eq!(View::Workers.next(), View::Charts);
        assert_eq!(View::Charts.next(), View::Workers);
        assert_eq!(View::Workers.prev(), View::Charts);
    }

    #[test]
    fn test_export_requires_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut app = app(vec![frame(&["w1"])]);
        assert!(app.export_state(&path).is_err());

        app.reload_data();
        app.export_state(&path).unwrap();
        assert!(path.exists());
    }
}
