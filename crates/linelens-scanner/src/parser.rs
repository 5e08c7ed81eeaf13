//! Line classification.
//!
//! Splits text into lines and classifies each one as blank, comment-only or
//! code. The parser does not understand string
//! literals, so a comment marker inside a string on a code line only matters
//! when it opens a block comment that is never closed on that line.

use crate::config::CommentSyntax;

/// Per-kind line counts produced by [`count_lines`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub total: u64,
    pub code: u64,
    pub comment: u64,
    pub blank: u64,
}

/// Count lines of `text` using the given comment syntax.
///
/// Without a syntax every non-blank line is code.
pub fn count_lines(text: &str, syntax: Option<&CommentSyntax>) -> LineCounts {
    let mut counts = LineCounts::default();
    // Closing delimiter of the block comment we are inside, if any
    let mut open_block: Option<&str> = None;

    for line in text.lines() {
        counts.total += 1;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            counts.blank += 1;
            continue;
        }

        let Some(syntax) = syntax else {
            counts.code += 1;
            continue;
        };

        let mut rest = trimmed;
        if let Some(close) = open_block {
            match rest.find(close) {
                Some(idx) => {
                    open_block = None;
                    rest = rest[idx + close.len()..].trim();
                }
                None => {
                    counts.comment += 1;
                    continue;
                }
            }
        }

        match classify_fragment(rest, syntax) {
            Fragment::Comment { unclosed } => {
                counts.comment += 1;
                open_block = unclosed;
            }
            Fragment::Code { unclosed } => {
                counts.code += 1;
                open_block = unclosed;
            }
        }
    }

    counts
}

enum Fragment<'a> {
    Comment { unclosed: Option<&'a str> },
    Code { unclosed: Option<&'a str> },
}

/// Classify what remains of a line once any leading block comment tail has
/// been consumed. An empty remainder counts as comment because the line held
/// only the end of a block comment.
fn classify_fragment<'a>(mut rest: &str, syntax: &'a CommentSyntax) -> Fragment<'a> {
    loop {
        if rest.is_empty() {
            return Fragment::Comment { unclosed: None };
        }

        if syntax.line.iter().any(|prefix| rest.starts_with(prefix.as_str())) {
            return Fragment::Comment { unclosed: None };
        }

        let leading_block = syntax
            .block
            .iter()
            .find(|(open, _)| rest.starts_with(open.as_str()));

        match leading_block {
            Some((open, close)) => {
                let after_open = &rest[open.len()..];
                match after_open.find(close.as_str()) {
                    Some(idx) => rest = after_open[idx + close.len()..].trim(),
                    None => {
                        return Fragment::Comment {
                            unclosed: Some(close.as_str()),
                        }
                    }
                }
            }
            None => {
                return Fragment::Code {
                    unclosed: trailing_unclosed_block(rest, syntax),
                }
            }
        }
    }
}

/// A code line may open a block comment that continues onto the next lines.
fn trailing_unclosed_block<'a>(line: &str, syntax: &'a CommentSyntax) -> Option<&'a str> {
    for (open, close) in &syntax.block {
        if let Some(idx) = line.rfind(open.as_str()) {
            let after = &line[idx + open.len()..];
            if !after.contains(close.as_str()) {
                return Some(close.as_str());
            }
        }
    }
    None
}
