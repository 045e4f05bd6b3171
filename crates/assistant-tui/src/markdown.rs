//! Inline markdown styling for the plain-text parts of assistant replies

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Render one line of markdown: headings, bullets, `**bold**`, `*italic*`
/// and `` `code` ``. Anything unterminated is kept literally.
pub fn render_line(text: &str) -> Line<'static> {
    let trimmed = text.trim_start();

    let heading_level = trimmed.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&heading_level) && trimmed[heading_level..].starts_with(' ') {
        let title = trimmed[heading_level..].trim().to_string();
        return Line::from(Span::styled(
            title,
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));
    }

    let indent = &text[..text.len() - trimmed.len()];
    for marker in ["- ", "* ", "+ "] {
        if let Some(item) = trimmed.strip_prefix(marker) {
            let mut spans = vec![Span::raw(format!("{}• ", indent))];
            spans.extend(parse_inline(item));
            return Line::from(spans);
        }
    }

    let spans = parse_inline(text);
    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Parse a line of text and convert inline markdown to styled spans
fn parse_inline(text: &str) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '`' => {
                let mut code = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    code.push(c);
                }

                if found_close && !code.is_empty() {
                    flush(&mut spans, &mut current_text);
                    spans.push(Span::styled(code, Style::default().fg(Color::Green)));
                } else {
                    current_text.push('`');
                    current_text.push_str(&code);
                    if found_close {
                        current_text.push('`');
                    }
                }
            }
            '*' if chars.peek() == Some(&'*') => {
                // Consume the second *
                chars.next();

                // Find closing **
                let mut bold_text = String::new();
                let mut found_close = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next();
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    flush(&mut spans, &mut current_text);
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                    if found_close {
                        current_text.push_str("**");
                    }
                }
            }
            '*' if chars.peek().is_some_and(|c| !c.is_whitespace()) => {
                let rest: String = chars.clone().collect();
                match rest.find('*') {
                    Some(end) if end > 0 => {
                        let italic: String = chars.by_ref().take(rest[..end].chars().count()).collect();
                        chars.next(); // closing *
                        flush(&mut spans, &mut current_text);
                        spans.push(Span::styled(
                            italic,
                            Style::default().add_modifier(Modifier::ITALIC),
                        ));
                    }
                    _ => current_text.push(c),
                }
            }
            _ => current_text.push(c),
        }
    }

    flush(&mut spans, &mut current_text);
    spans
}

fn flush(spans: &mut Vec<Span<'static>>, current_text: &mut String) {
    if !current_text.is_empty() {
        spans.push(Span::raw(std::mem::take(current_text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_bold_and_code_spans() {
        let line = render_line("use **cargo** and `rustc` here");
        assert_eq!(plain(&line), "use cargo and rustc here");
        assert_eq!(line.spans.len(), 5);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[3].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_italic() {
        let line = render_line("an *emphasised* word");
        assert_eq!(plain(&line), "an emphasised word");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_unterminated_markers_stay_literal() {
        assert_eq!(plain(&render_line("2 * 3 = 6")), "2 * 3 = 6");
        assert_eq!(plain(&render_line("**half bold")), "**half bold");
        assert_eq!(plain(&render_line("tick ` alone")), "tick ` alone");
    }

    #[test]
    fn test_heading_and_bullet() {
        let heading = render_line("## Setup");
        assert_eq!(plain(&heading), "Setup");
        assert!(heading.spans[0].style.add_modifier.contains(Modifier::BOLD));

        assert_eq!(plain(&render_line("  - item **one**")), "  • item one");
        assert_eq!(plain(&render_line("#hashtag")), "#hashtag");
    }

    #[test]
    fn test_empty_line() {
        assert!(render_line("").spans.is_empty());
    }
}
