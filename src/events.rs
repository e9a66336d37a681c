use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, View};

/// Where the `e` key writes the export.
pub const EXPORT_PATH: &str = "depviz_export.json";

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

    // While the detail is open the cursor keys move the selection and
    // Enter re-taps, so the panel follows the cursor.
    if app.detail_visible() {
        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => app.tap_background(),
            KeyCode::Up | KeyCode::Char('k') => {
                app.select_prev();
                app.tap_selected();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.select_next();
                app.tap_selected();
            }
            KeyCode::Enter => app.tap_selected(),
            _ => {}
        }
        return;
    }

    if app.filter_active {
        handle_filter_input(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        // View switching
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),

        KeyCode::Char('1') => app.set_view(View::Services),
        KeyCode::Char('2') => app.set_view(View::Dependencies),
        KeyCode::Char('3') => app.set_view(View::Flow),

        // Navigation (up/down for items, left/right for tabs)
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        KeyCode::Enter => app.tap_selected(),
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),

        KeyCode::Char('w') => app.cycle_window(),
        KeyCode::Char('r') => app.request_refresh(),

        KeyCode::Char('?') => app.toggle_help(),

        // Sorting (Services and Dependencies views)
        KeyCode::Char('s') => app.cycle_sort(),
        KeyCode::Char('S') => app.toggle_sort_direction(),

        KeyCode::Char('/') => app.start_filter(),
        KeyCode::Char('c') => {
            if !app.filter_text.is_empty() {
                app.clear_filter();
            }
        }

        KeyCode::Char('e') => {
            let export_path = PathBuf::from(EXPORT_PATH);
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
        KeyCode::Enter => {
            app.filter_active = false;
        }

        // Keep text but exit input mode
        KeyCode::Esc => {
            app.cancel_filter();
        }

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

/// Handle mouse events.
///
/// `content_start_row` is the screen row of the first table row. A left
/// click on a row taps that element; a click below the last row taps the
/// background.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.select_prev(),
        MouseEventKind::ScrollDown => app.select_next(),

        MouseEventKind::Down(MouseButton::Left) => {
            let clicked_row = mouse.row;

            // Tab clicks (row 1, after header)
            if clicked_row == 1 {
                let col = mouse.column;
                // Approximate tab positions: Services (0-13), Dependencies (14-31), Flow (32-40)
                if col < 14 {
                    app.set_view(View::Services);
                } else if col < 32 {
                    app.set_view(View::Dependencies);
                } else if col < 41 {
                    app.set_view(View::Flow);
                }
                return;
            }

            if clicked_row >= content_start_row {
                let item_row = (clicked_row - content_start_row) as usize;
                if app.select_row(item_row) {
                    app.tap_selected();
                } else {
                    app.tap_background();
                }
            }
        }

        // Right-click goes back
        MouseEventKind::Down(MouseButton::Right) => app.go_back(),

        _ => {}
    }
}
