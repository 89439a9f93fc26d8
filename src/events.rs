use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, View};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    // If detail overlay is shown, handle overlay-specific keys
    if app.show_detail_overlay {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace | KeyCode::Char('q') => {
                app.close_overlay();
            }
            // Allow scrolling through workers while overlay is open
            KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => app.select_next(),
            KeyCode::PageUp => app.select_prev_n(10),
            KeyCode::PageDown => app.select_next_n(10),
            KeyCode::Home => app.select_first(),
            KeyCode::End => app.select_last(),
            _ => {}
        }
        return;
    }

    // If filter input is active, handle text input
    if app.filter_active {
        handle_filter_input(app, key);
        return;
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        // View switching
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),
        KeyCode::Char('1') => app.set_view(View::Workers),
        KeyCode::Char('2') => app.set_view(View::Charts),

        // Navigation (up/down for items, left/right for tabs)
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Enter detail overlay
        KeyCode::Enter => app.enter_detail(),

        // Go back (Esc and Backspace)
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),

        // Help
        KeyCode::Char('?') => app.toggle_help(),

        // Sorting (Workers view)
        KeyCode::Char('s') if app.current_view == View::Workers => app.cycle_sort(),
        KeyCode::Char('S') if app.current_view == View::Workers => app.toggle_sort_direction(),

        // Filter (start typing to filter)
        KeyCode::Char('/') => app.start_filter(),

        // Clear filter
        KeyCode::Char('c') => {
            if !app.filter_text.is_empty() {
                app.clear_filter();
            }
        }

        // Export
        KeyCode::Char('e') => {
            let export_path = app.export_path.clone();
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => {}
    }
}

/// Handle key input while filter is active
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        // Confirm filter
        KeyCode::Enter => {
            app.filter_active = false;
        }

        // Cancel filter (keep text but exit input mode)
        KeyCode::Esc => {
            app.cancel_filter();
        }

        // Clear and exit
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_filter();
        }

        KeyCode::Backspace => {
            app.filter_pop();
            if app.filter_text.is_empty() {
                app.filter_active = false;
            }
        }

        KeyCode::Char(c) => {
            app.filter_push(c);
        }

        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        // Scroll wheel
        MouseEventKind::ScrollUp => {
            app.select_prev();
        }
        MouseEventKind::ScrollDown => {
            app.select_next();
        }

        // Click to select
        MouseEventKind::Down(MouseButton::Left) => {
            let clicked_row = mouse.row;

            // Content area: after header, tabs, table border and header
            if clicked_row > content_start_row && app.current_view == View::Workers {
                let item_row = (clicked_row - content_start_row - 1) as usize;
                if item_row < app.visible_workers().len() {
                    app.selected_worker_index = item_row;
                }
            }

            // Tab clicks (row 1, after header)
            if clicked_row == 1 {
                // Approximate tab positions: Workers (0-12), Charts (13-23)
                let col = mouse.column;
                if col < 13 {
                    app.set_view(View::Workers);
                } else if col < 24 {
                    app.set_view(View::Charts);
                }
            }
        }

        // Right-click goes back
        MouseEventKind::Down(MouseButton::Right) => {
            app.go_back();
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Thresholds;
    use crate::source::{DataSource, FeedFrame, LinkState, StateSnapshot, TransportMode, WorkerSnapshot};
    use crate::ui::Theme;
    use std::sync::Arc;

    #[derive(Debug)]
    struct OneFrame(Option<Arc<FeedFrame>>);

    impl DataSource for OneFrame {
        fn poll(&mut self) -> Option<Arc<FeedFrame>> {
            self.0.take()
        }

        fn description(&self) -> &str {
            "one frame"
        }

        fn link(&self) -> LinkState {
            LinkState::default()
        }
    }

    fn app() -> App {
        let snapshot = StateSnapshot {
            workers: ["w1", "w2"]
                .iter()
                .map(|id| WorkerSnapshot {
                    id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let frame = FeedFrame::single(snapshot, 1_000, TransportMode::Pull, 60_000);
        let mut app = App::with_theme(
            Box::new(OneFrame(Some(Arc::new(frame)))),
            Thresholds::default(),
            Theme::dark(),
        );
        app.reload_data();
        app
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_view_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.current_view, View::Charts);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.current_view, View::Workers);
    }

    #[test]
    fn test_sort_keys_only_on_workers() {
        let mut app = app();
        let initial = app.sort_column;
        press(&mut app, KeyCode::Char('s'));
        assert_ne!(app.sort_column, initial);

        app.set_view(View::Charts);
        let before = app.sort_column;
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.sort_column, before);
    }

    #[test]
    fn test_filter_captures_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Char('/'));
        press(&mut app, KeyCode::Char('q'));
        assert!(app.running);
        assert_eq!(app.filter_text, "q");

        press(&mut app, KeyCode::Esc);
        assert!(!app.filter_active);
        press(&mut app, KeyCode::Char('c'));
        assert!(app.filter_text.is_empty());
    }

    #[test]
    fn test_detail_overlay_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        assert!(app.show_detail_overlay);

        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected_worker().unwrap().id, "w2");

        press(&mut app, KeyCode::Char('q'));
        assert!(!app.show_detail_overlay);
        assert!(app.running);
    }

    #[test]
    fn test_quit() {
        let mut app = app();
        handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!app.running);
    }
}
