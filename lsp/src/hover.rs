//! Hover documentation for built-in functions.

use crate::catalog::Catalog;
use crate::protocol::{Hover, MarkupContent, Position};
use crate::text;

/// Documentation for the word under the cursor, or `None` when the cursor is
/// not on a documented word.
pub(crate) fn hover(catalog: &dyn Catalog, text: &str, position: Position) -> Option<Hover> {
    let (word, range) = text::word_at(text, position)?;
    let doc = catalog.documentation(word)?;
    Some(Hover {
        contents: MarkupContent::markdown(doc),
        range: Some(range),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::protocol::Range;

    #[test]
    fn documented_word_yields_markdown() {
        let text = "total = sum(values)\n";
        let hover = hover(&StaticCatalog, text, Position::new(0, 9)).unwrap();
        assert_eq!(hover.contents.kind, "markdown");
        assert_eq!(
            hover.contents.value,
            "Sum all elements in a list\n\nUsage: `sum(numbers)`"
        );
        assert_eq!(
            hover.range,
            Some(Range::new(Position::new(0, 8), Position::new(0, 11)))
        );
    }

    #[test]
    fn unknown_word_is_none() {
        assert!(hover(&StaticCatalog, "total = 1", Position::new(0, 2)).is_none());
    }

    #[test]
    fn whitespace_is_none() {
        assert!(hover(&StaticCatalog, "out(1)   ", Position::new(0, 8)).is_none());
    }
}
