use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode, Intent};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Stream(update) => app.apply_stream_update(update),
        AppEvent::Context(update) => app.apply_context_update(update),
        AppEvent::Health(health) => app.apply_health(health),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('k') if ctrl => {
            app.toggle_context_panel();
            return;
        }
        KeyCode::Char('y') if ctrl => {
            app.copy_code_block(None);
            return;
        }
        KeyCode::Char('l') if ctrl => {
            app.clear_conversation();
            return;
        }
        _ => {}
    }

    // The document modal captures navigation until closed
    if app.document_view.is_some() {
        handle_document_keys(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_document_keys(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_document(),
        KeyCode::Char('j') | KeyCode::Down => {
            app.document_scroll = app.document_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.document_scroll = app.document_scroll.saturating_sub(1);
        }
        KeyCode::PageDown => app.document_scroll = app.document_scroll.saturating_add(10),
        KeyCode::PageUp => app.document_scroll = app.document_scroll.saturating_sub(10),
        KeyCode::Char('g') => app.document_scroll = 0,
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
            app.focus = FocusPane::Chat;
        }

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Chat => app.scroll_down(1),
            FocusPane::Context => app.context_nav_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Chat => app.scroll_up(1),
            FocusPane::Context => app.context_nav_up(),
        },
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        // Tab to switch focus (only when the context panel is showing)
        KeyCode::Tab => {
            if app.show_context_panel {
                app.focus = match app.focus {
                    FocusPane::Chat => FocusPane::Context,
                    FocusPane::Context => FocusPane::Chat,
                };
            }
        }

        KeyCode::Char('X') => app.toggle_context_panel(),

        KeyCode::Enter => {
            if app.focus == FocusPane::Context {
                app.open_document();
            } else {
                app.input_mode = InputMode::Editing;
            }
        }

        // Copy code blocks of the newest reply
        KeyCode::Char('y') => app.copy_code_block(None),
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            app.copy_code_block(Some(index));
        }

        _ => {}
    }
}

/// Replace the input through the coordinator, keeping the cursor in step
fn edit_input(app: &mut App, text: String, cursor: usize) {
    if app.conversation.is_loading() {
        return;
    }
    app.apply_intent(Intent::InputChanged(text));
    app.input_cursor = cursor;
}

fn insert_char(app: &mut App, c: char) {
    let mut text = app.input_text.clone();
    let byte_pos = char_to_byte_index(&text, app.input_cursor);
    text.insert(byte_pos, c);
    let cursor = app.input_cursor + 1;
    edit_input(app, text, cursor);
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let char_count = app.input_text.chars().count();

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }

        // Shift+Enter needs keyboard enhancement; Alt+Enter and Ctrl+J work everywhere
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            insert_char(app, '\n');
        }
        KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            insert_char(app, '\n');
        }
        KeyCode::Enter => {
            app.apply_intent(Intent::SendRequested);
        }

        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                let mut text = app.input_text.clone();
                let byte_pos = char_to_byte_index(&text, app.input_cursor - 1);
                text.remove(byte_pos);
                let cursor = app.input_cursor - 1;
                edit_input(app, text, cursor);
            }
        }
        KeyCode::Delete => {
            if app.input_cursor < char_count {
                let mut text = app.input_text.clone();
                let byte_pos = char_to_byte_index(&text, app.input_cursor);
                text.remove(byte_pos);
                let cursor = app.input_cursor;
                edit_input(app, text, cursor);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = char_count;
        }
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            insert_char(app, c);
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if app.document_view.is_some() {
                app.document_scroll = app.document_scroll.saturating_add(3);
            } else if in_chat {
                app.scroll_down(3);
            } else if app.show_context_panel {
                app.context_nav_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if app.document_view.is_some() {
                app.document_scroll = app.document_scroll.saturating_sub(3);
            } else if in_chat {
                app.scroll_up(3);
            } else if app.show_context_panel {
                app.context_nav_up();
            }
        }
        _ => {}
    }
}
