use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use assistant_core::segment::{segment, SegmentKind};
use assistant_core::{ChatMessage, ChatRole, ContextItem, Relevance};

use crate::app::{FocusPane, InputMode};
use crate::highlight::highlight_code;
use crate::markdown;

const MAX_INPUT_ROWS: usize = 5;

/// Everything a frame is drawn from. Rendering never mutates state; what it
/// measures comes back as a `FrameLayout`.
#[derive(Debug, Clone, Copy)]
pub struct ChatView<'a> {
    pub messages: &'a [ChatMessage],
    pub input_text: &'a str,
    pub input_cursor: usize,
    pub is_loading: bool,
    pub waiting_for_first_token: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub animation_frame: u8,
    pub context_items: &'a [ContextItem],
    pub context_selected: Option<usize>,
    pub show_context_panel: bool,
    pub document: Option<(&'a ContextItem, u16)>,
    pub status: Option<&'a str>,
}

/// Measurements from a render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLayout {
    pub chat_area: Rect,
    /// Scroll offset actually used for the chat
    pub scroll: u16,
    pub max_scroll: u16,
}

/// Wrap text to fit within a given width, returning multiple lines
/// Uses word boundaries for wrapping (doesn't break mid-word)
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Split text into alternating runs of whitespace and non-whitespace
fn split_words(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut prev_ws = None;

    for (i, c) in text.char_indices() {
        let ws = c.is_whitespace();
        if prev_ws.is_some_and(|p| p != ws) {
            tokens.push(&text[start..i]);
            start = i;
        }
        prev_ws = Some(ws);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }

    tokens
}

/// Word-wrap styled lines so that every row fits in `width` columns.
/// Words wider than a row are broken by character. Whitespace at a break
/// is dropped. The chat is drawn from these rows without further wrapping,
/// so the row count is exactly what ends up on screen.
fn wrap_lines(lines: Vec<Line<'static>>, width: u16) -> Vec<Line<'static>> {
    let width = width.max(1) as usize;
    let mut rows = Vec::new();

    for line in lines {
        if line.width() <= width {
            rows.push(line);
            continue;
        }

        let mut row: Vec<Span<'static>> = Vec::new();
        let mut row_width = 0;

        for span in line.spans {
            let style = span.style;
            for token in split_words(&span.content) {
                let token_width = Span::raw(token).width();

                if row_width + token_width <= width {
                    row.push(Span::styled(token.to_string(), style));
                    row_width += token_width;
                } else if token.trim().is_empty() {
                    if !row.is_empty() {
                        rows.push(Line::from(std::mem::take(&mut row)));
                        row_width = 0;
                    }
                } else if token_width <= width {
                    if !row.is_empty() {
                        rows.push(Line::from(std::mem::take(&mut row)));
                    }
                    row.push(Span::styled(token.to_string(), style));
                    row_width = token_width;
                } else {
                    for ch in token.chars() {
                        let ch_width = Span::raw(ch.to_string()).width();
                        if row_width + ch_width > width && !row.is_empty() {
                            rows.push(Line::from(std::mem::take(&mut row)));
                            row_width = 0;
                        }
                        row.push(Span::styled(ch.to_string(), style));
                        row_width += ch_width;
                    }
                }
            }
        }

        if !row.is_empty() {
            rows.push(Line::from(row));
        }
    }

    rows
}

struct CachedMessage {
    role: ChatRole,
    content: String,
    numbered: bool,
    width: u16,
    rows: Vec<Line<'static>>,
}

/// Wrapped rows of every message from earlier frames. Only a message whose
/// content, numbering or the chat width changed is segmented and
/// highlighted again, which during streaming is just the newest one.
#[derive(Default)]
pub struct LineCache {
    entries: Vec<CachedMessage>,
    #[cfg(test)]
    builds: usize,
}

impl LineCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&mut self, index: usize, msg: &ChatMessage, numbered: bool, width: u16) -> &[Line<'static>] {
        let fresh = self.entries.get(index).is_some_and(|e| {
            e.role == msg.role && e.numbered == numbered && e.width == width && e.content == msg.content
        });

        if !fresh {
            #[cfg(test)]
            {
                self.builds += 1;
            }
            let entry = CachedMessage {
                role: msg.role,
                content: msg.content.clone(),
                numbered,
                width,
                rows: wrap_lines(message_body(msg, numbered), width),
            };
            if index < self.entries.len() {
                self.entries[index] = entry;
            } else {
                self.entries.push(entry);
            }
        }

        &self.entries[index].rows
    }
}

pub fn render(view: &ChatView, cache: &mut LineCache, frame: &mut Frame) -> FrameLayout {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(view, frame, header_area);

    let (chat_column, context_area) = if view.show_context_panel {
        let [chat, context] = Layout::horizontal([
            Constraint::Percentage(65),
            Constraint::Percentage(35),
        ])
        .areas(body_area);
        (chat, Some(context))
    } else {
        (body_area, None)
    };

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(input_height(view.input_text)),
    ])
    .areas(chat_column);

    let (scroll, max_scroll) = render_chat(view, cache, frame, chat_area);
    render_input(view, frame, input_area);

    if let Some(context_area) = context_area {
        render_context_panel(view, frame, context_area);
    }

    render_footer(view, frame, footer_area);

    if let Some((item, doc_scroll)) = view.document {
        render_document(item, doc_scroll, frame, area);
    }

    FrameLayout {
        chat_area,
        scroll,
        max_scroll,
    }
}

fn render_header(view: &ChatView, frame: &mut Frame, area: Rect) {
    let context_indicator = if view.context_items.is_empty() {
        String::new()
    } else {
        format!(" [{} context]", view.context_items.len())
    };

    let title = Line::from(vec![
        Span::styled(" LLM Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(context_indicator, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(view: &ChatView, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match view.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<(&str, &str)> = if view.document.is_some() {
        vec![(" j/k ", " scroll "), (" Esc ", " close ")]
    } else {
        match (view.input_mode, view.focus) {
            (InputMode::Editing, _) => vec![
                (" Enter ", " send "),
                (" S-Enter ", " newline "),
                (" ^Y ", " copy code "),
                (" ^K ", " context "),
                (" Esc ", " stop typing "),
            ],
            (InputMode::Normal, FocusPane::Chat) => vec![
                (" j/k ", " scroll "),
                (" i ", " type "),
                (" y/1-9 ", " copy code "),
                (" X ", " context "),
                (" Tab ", " focus "),
                (" ^L ", " clear "),
                (" q ", " quit "),
            ],
            (InputMode::Normal, FocusPane::Context) => vec![
                (" j/k ", " nav "),
                (" Enter ", " open "),
                (" Tab ", " focus "),
                (" X ", " hide "),
                (" q ", " quit "),
            ],
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in hints {
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
    }
    if let Some(status) = view.status {
        spans.push(Span::styled(
            format!(" {} ", status),
            Style::default().bg(Color::Black).fg(Color::Yellow),
        ));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Rows for the whole conversation, wrapped to `width`
pub fn message_lines(view: &ChatView, cache: &mut LineCache, width: u16) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let newest = view.messages.len().saturating_sub(1);

    for (i, msg) in view.messages.iter().enumerate() {
        let numbered = i == newest && msg.role == ChatRole::Assistant;
        lines.extend_from_slice(cache.rows(i, msg, numbered, width));

        if i == newest && msg.role == ChatRole::Assistant && view.waiting_for_first_token {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((view.animation_frame as usize % 3) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::default());
    }
    cache.entries.truncate(view.messages.len());

    lines
}

/// Role label and content of one message, before wrapping
fn message_body(msg: &ChatMessage, numbered: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in msg.content.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::Cyan),
                )));
            }
        }
        ChatRole::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.extend(assistant_lines(&msg.content, numbered));
        }
    }

    lines
}

/// Assistant content routed through the segmenter. Code blocks of the
/// newest message are numbered for the copy keys.
fn assistant_lines(content: &str, number_blocks: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut block_no = 0;
    let mut after_code = false;

    for seg in segment(content) {
        match seg.kind {
            SegmentKind::Text => {
                // The newline closing a fence belongs to the fence visually
                let text = if after_code {
                    seg.content.strip_prefix('\n').unwrap_or(&seg.content)
                } else {
                    &seg.content
                };
                for line in text.lines() {
                    lines.push(markdown::render_line(line));
                }
                after_code = false;
            }
            SegmentKind::Code => {
                block_no += 1;
                let border = Style::default().fg(Color::DarkGray);

                let mut header = format!("┌─ {} ", seg.language());
                if number_blocks {
                    header.push_str(&format!("[{}] ", block_no));
                }
                if !seg.closed {
                    header.push('…');
                }
                lines.push(Line::from(Span::styled(header, border)));

                for code_line in highlight_code(&seg.content, seg.language()) {
                    let mut spans = vec![Span::styled("│ ", border)];
                    spans.extend(code_line.spans);
                    lines.push(Line::from(spans));
                }

                if seg.closed {
                    lines.push(Line::from(Span::styled("└─", border)));
                }
                after_code = true;
            }
        }
    }

    lines
}

fn render_chat(view: &ChatView, cache: &mut LineCache, frame: &mut Frame, area: Rect) -> (u16, u16) {
    let chat_focused = view.focus == FocusPane::Chat && view.input_mode == InputMode::Normal;
    let border_color = if chat_focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Personal AI Assistant ");

    if view.messages.is_empty() {
        let placeholder = Paragraph::new(Text::from(Span::styled(
            "Ask a question...",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        frame.render_widget(placeholder, area);
        return (0, 0);
    }

    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);
    let lines = message_lines(view, cache, inner_width);

    let total_rows = lines.len().min(u16::MAX as usize) as u16;
    let max_scroll = total_rows.saturating_sub(inner_height);
    let scroll = if view.follow_bottom {
        max_scroll
    } else {
        view.chat_scroll.min(max_scroll)
    };

    let chat = Paragraph::new(lines).block(block).scroll((scroll, 0));

    frame.render_widget(chat, area);
    (scroll, max_scroll)
}

fn input_height(input: &str) -> u16 {
    input.split('\n').count().clamp(1, MAX_INPUT_ROWS) as u16 + 2
}

/// Row and column (in chars) of the cursor within multi-line input
fn cursor_row_col(input: &str, cursor: usize) -> (usize, usize) {
    let before: String = input.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
    (row, col)
}

fn render_input(view: &ChatView, frame: &mut Frame, area: Rect) {
    let editing = view.input_mode == InputMode::Editing && !view.is_loading;

    let (title, border_color, text_style) = if view.is_loading {
        (" Sending... ", Color::DarkGray, Style::default().fg(Color::DarkGray))
    } else if editing {
        (" Message ", Color::Yellow, Style::default().fg(Color::Cyan))
    } else {
        (" Message (i to type) ", Color::DarkGray, Style::default().fg(Color::Cyan))
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Inner size = total size - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let (row, col) = cursor_row_col(view.input_text, view.input_cursor);

    // Keep the cursor visible, vertically and horizontally
    let row_offset = if inner_height == 0 { 0 } else { row.saturating_sub(inner_height - 1) };
    let col_offset = if inner_width == 0 || col < inner_width { 0 } else { col - inner_width + 1 };

    let visible: Vec<Line> = view
        .input_text
        .split('\n')
        .skip(row_offset)
        .take(inner_height)
        .map(|line| Line::from(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
        .collect();

    let input = Paragraph::new(visible).style(text_style).block(input_block);
    frame.render_widget(input, area);

    if editing {
        frame.set_cursor_position((
            area.x + (col - col_offset) as u16 + 1,
            area.y + (row - row_offset) as u16 + 1,
        ));
    }
}

fn relevance_style(relevance: Relevance) -> Style {
    let color = match relevance {
        Relevance::High => Color::Green,
        Relevance::Medium => Color::Yellow,
        Relevance::Low => Color::Red,
        Relevance::NotRelevant => Color::DarkGray,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn render_context_panel(view: &ChatView, frame: &mut Frame, area: Rect) {
    let focused = view.focus == FocusPane::Context && view.input_mode == InputMode::Normal;
    let border_color = if focused { Color::Cyan } else { Color::Magenta };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Related Context ({}) ", view.context_items.len()));

    if view.context_items.is_empty() {
        let placeholder = Paragraph::new("No context available")
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    // Room for the "> " highlight symbol
    let text_width = area.width.saturating_sub(4) as usize;

    let items: Vec<ListItem> = view
        .context_items
        .iter()
        .map(|item| {
            let mut lines: Vec<Line> = wrap_text_to_width(&item.text, text_width)
                .into_iter()
                .take(3)
                .map(Line::from)
                .collect();
            lines.push(Line::from(vec![
                Span::styled("Source: ", Style::default().fg(Color::DarkGray)),
                Span::styled(item.source.clone(), Style::default().fg(Color::Yellow)),
            ]));
            lines.push(Line::from(vec![
                Span::styled(item.relevance.as_str(), relevance_style(item.relevance)),
                Span::styled(
                    format!("  similarity {:.3}", item.similarity),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
            lines.push(Line::default());
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(view.context_selected);
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_document(item: &ContextItem, scroll: u16, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = (area.width * 4 / 5).max(20).min(area.width);
    let popup_height = (area.height * 4 / 5).max(5).min(area.height);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} (Esc to close) ", item.source));

    let document = Paragraph::new(item.document().to_string())
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(document, popup_area);
}
