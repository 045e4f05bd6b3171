//! Syntax highlighting for fenced code blocks

use std::sync::OnceLock;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Lazy-initialized syntect highlighting assets.
struct HighlightAssets {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

/// Returns a reference to the shared syntect assets (loaded once).
fn assets() -> &'static HighlightAssets {
    static ASSETS: OnceLock<HighlightAssets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .remove("base16-eighties.dark")
            .or_else(|| theme_set.themes.into_values().next());
        HighlightAssets { syntax_set, theme }
    })
}

fn plain_style() -> Style {
    Style::default().fg(Color::Gray)
}

/// Highlight `code` as `language`, one terminal line per source line.
///
/// Unknown languages render as plain text, and a block that fails to
/// highlight falls back to its raw content.
pub fn highlight_code(code: &str, language: &str) -> Vec<Line<'static>> {
    match try_highlight(code, language) {
        Some(Ok(lines)) => lines,
        Some(Err(e)) => {
            tracing::warn!(language, error = %e, "Highlighting failed, showing raw code");
            plain_lines(code)
        }
        None => plain_lines(code),
    }
}

fn try_highlight(code: &str, language: &str) -> Option<Result<Vec<Line<'static>>, syntect::Error>> {
    let assets = assets();
    let theme = assets.theme.as_ref()?;
    let syntax = assets
        .syntax_set
        .find_syntax_by_token(language)
        .or_else(|| assets.syntax_set.find_syntax_by_extension(language))?;

    let mut highlighter = HighlightLines::new(syntax, theme);
    let mut lines = Vec::new();

    for source_line in LinesWithEndings::from(code) {
        let ranges = match highlighter.highlight_line(source_line, &assets.syntax_set) {
            Ok(ranges) => ranges,
            Err(e) => return Some(Err(e)),
        };

        let spans: Vec<Span<'static>> = ranges
            .into_iter()
            .filter_map(|(style, text)| {
                let text = text.trim_end_matches(|c: char| c == '\n' || c == '\r');
                if text.is_empty() {
                    return None;
                }
                let mut ratatui_style = Style::default()
                    .fg(Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b));
                if style.font_style.contains(FontStyle::BOLD) {
                    ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
                }
                if style.font_style.contains(FontStyle::ITALIC) {
                    ratatui_style = ratatui_style.add_modifier(Modifier::ITALIC);
                }
                Some(Span::styled(text.to_string(), ratatui_style))
            })
            .collect();
        lines.push(Line::from(spans));
    }

    Some(Ok(lines))
}

/// Raw code, one line per source line
fn plain_lines(code: &str) -> Vec<Line<'static>> {
    code.lines()
        .map(|line| Line::from(Span::styled(line.to_string(), plain_style())))
        .collect()
}
