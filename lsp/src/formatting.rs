//! Brace-depth reindentation.

use crate::protocol::{FormattingOptions, Position, Range, TextEdit};
use crate::text;

/// Result of formatting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    /// The document is already formatted.
    Unchanged,
    /// Edits that turn the document into its formatted form, in line order.
    Edits(Vec<TextEdit>),
}

impl FormatOutcome {
    pub fn into_edits(self) -> Vec<TextEdit> {
        match self {
            Self::Unchanged => Vec::new(),
            Self::Edits(edits) => edits,
        }
    }
}

/// Formats whole documents.
pub trait Formatter: Send + Sync + 'static {
    fn format(&self, text: &str, options: &FormattingOptions) -> FormatOutcome;
}

/// Re-indents every line to its `{`/`}` nesting depth.
///
/// Lines are never added, removed or joined; only leading whitespace changes,
/// trailing whitespace is dropped and blank lines become empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceFormatter;

impl Formatter for BraceFormatter {
    fn format(&self, text: &str, options: &FormattingOptions) -> FormatOutcome {
        let unit = indent_unit(options);
        let mut depth = 0usize;
        let mut edits = Vec::new();

        for (index, line) in text.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let trimmed = line.trim();

            let formatted = if trimmed.is_empty() {
                String::new()
            } else {
                let leading = leading_closers(trimmed);
                let level = depth.saturating_sub(leading);
                let (opens, closes) = brace_balance(trimmed);
                depth = (level + opens).saturating_sub(closes.saturating_sub(leading));
                format!("{}{trimmed}", unit.repeat(level))
            };

            if formatted != line {
                let line_no = index as u32;
                edits.push(TextEdit {
                    range: Range::new(
                        Position::new(line_no, 0),
                        Position::new(line_no, text::utf16_len(line)),
                    ),
                    new_text: formatted,
                });
            }
        }

        if edits.is_empty() {
            FormatOutcome::Unchanged
        } else {
            FormatOutcome::Edits(edits)
        }
    }
}

fn indent_unit(options: &FormattingOptions) -> String {
    if options.insert_spaces {
        " ".repeat(options.tab_size as usize)
    } else {
        "\t".to_string()
    }
}

/// Number of `}` that open the line, possibly separated by whitespace.
fn leading_closers(trimmed: &str) -> usize {
    trimmed
        .chars()
        .take_while(|c| *c == '}' || c.is_whitespace())
        .filter(|c| *c == '}')
        .count()
}

/// Counts of `{` and `}` outside string and char literals and comments.
///
/// `//` and `#` start a comment, except `#` directly followed by a hex digit,
/// which is a color literal.
fn brace_balance(line: &str) -> (usize, usize) {
    let mut opens = 0;
    let mut closes = 0;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let mut escaped = false;
                for s in chars.by_ref() {
                    match s {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                // Exactly one character between quotes; a lone quote is punctuation.
                let mut lookahead = chars.clone();
                if lookahead.next().is_some() && lookahead.next() == Some('\'') {
                    chars = lookahead;
                }
            }
            '/' if chars.peek() == Some(&'/') => break,
            '#' if !chars.peek().is_some_and(char::is_ascii_hexdigit) => break,
            '{' => opens += 1,
            '}' => closes += 1,
            _ => {}
        }
    }

    (opens, closes)
}
