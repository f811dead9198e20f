//! Line and column arithmetic over document text.
//!
//! LSP columns count UTF-16 code units; Rust strings are indexed by bytes.

use crate::protocol::{Position, Range};

/// The `line`-th line (0-based) without its terminator.
pub(crate) fn line_at(text: &str, line: u32) -> Option<&str> {
    text.split('\n')
        .nth(line as usize)
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
}

/// Byte offset within `line` of a UTF-16 column, clamped to the line length.
pub(crate) fn byte_offset(line: &str, character: u32) -> usize {
    let mut units = 0u32;
    for (offset, ch) in line.char_indices() {
        if units >= character {
            return offset;
        }
        units += ch.len_utf16() as u32;
    }
    line.len()
}

pub(crate) fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Text of the cursor's line up to the cursor.
pub(crate) fn line_prefix(text: &str, position: Position) -> &str {
    line_at(text, position.line).map_or("", |line| {
        &line[..byte_offset(line, position.character)]
    })
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// The identifier touching `position`, and its range.
///
/// A cursor just after the last character of a word still selects it.
pub(crate) fn word_at(text: &str, position: Position) -> Option<(&str, Range)> {
    let line = line_at(text, position.line)?;
    let cursor = byte_offset(line, position.character);

    let start = line[..cursor]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map_or(cursor, |(i, _)| i);
    let end = line[cursor..]
        .char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map_or(line.len(), |(i, _)| cursor + i);
    if start == end {
        return None;
    }

    let range = Range::new(
        Position::new(position.line, utf16_len(&line[..start])),
        Position::new(position.line, utf16_len(&line[..end])),
    );
    Some((&line[start..end], range))
}
