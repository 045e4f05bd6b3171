//! Splitting assistant text into plain-text and fenced-code segments
//!
//! Works on partial content: while a response is still streaming the last
//! fence is usually unterminated, and that block is reported as an open code
//! segment running to the end of the input.

pub const FENCE: &str = "```";

/// Language used for code blocks whose fence carries no tag
pub const DEFAULT_LANGUAGE: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Set for code segments only
    pub language: Option<String>,
    pub content: String,
    /// False for a code block whose closing fence has not arrived yet
    pub closed: bool,
}

impl Segment {
    fn text(content: &str) -> Self {
        Self {
            kind: SegmentKind::Text,
            language: None,
            content: content.to_string(),
            closed: true,
        }
    }

    fn code(language: String, content: &str, closed: bool) -> Self {
        Self {
            kind: SegmentKind::Code,
            language: Some(language),
            content: content.to_string(),
            closed,
        }
    }

    pub fn is_code(&self) -> bool {
        self.kind == SegmentKind::Code
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }
}

fn language_tag(opening_line: &str) -> String {
    let tag = opening_line.trim();
    if tag.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        tag.to_string()
    }
}

/// Split `text` on fenced-code delimiters.
pub fn segment(text: &str) -> Vec<Segment> {
    if text.is_empty() {
        return vec![Segment::text("")];
    }

    let mut segments = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let rest = &text[cursor..];

        let Some(open) = rest.find(FENCE) else {
            segments.push(Segment::text(rest));
            break;
        };

        if open > 0 {
            segments.push(Segment::text(&rest[..open]));
        }

        let after_fence = &rest[open + FENCE.len()..];
        let Some(newline) = after_fence.find('\n') else {
            // Cut off inside the opening line
            segments.push(Segment::code(language_tag(after_fence), "", false));
            break;
        };

        let language = language_tag(&after_fence[..newline]);
        let body = &after_fence[newline + 1..];

        match body.find(FENCE) {
            Some(close) => {
                segments.push(Segment::code(language, &body[..close], true));
                cursor += open + FENCE.len() + newline + 1 + close + FENCE.len();
            }
            None => {
                segments.push(Segment::code(language, body, false));
                break;
            }
        }
    }

    segments
}

/// Re-emit segments as text, restoring the fences around code blocks.
pub fn reconstruct(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg.kind {
            SegmentKind::Text => out.push_str(&seg.content),
            SegmentKind::Code => {
                out.push_str(FENCE);
                out.push_str(seg.language());
                out.push('\n');
                out.push_str(&seg.content);
                if seg.closed {
                    out.push_str(FENCE);
                }
            }
        }
    }
    out
}

/// The code blocks of `text`, in order
pub fn code_blocks(text: &str) -> Vec<Segment> {
    segment(text).into_iter().filter(Segment::is_code).collect()
}
