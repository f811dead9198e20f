//! Completion items from the language catalog.

use crate::catalog::Catalog;
use crate::protocol::{CompletionItem, CompletionItemKind, Position};
use crate::text;

/// Completions at `position`.
///
/// Right after a `|` type annotation only type names are offered. Everywhere
/// else built-in functions are listed, then keywords, in table order.
pub(crate) fn completions(
    catalog: &dyn Catalog,
    text: &str,
    position: Position,
) -> Vec<CompletionItem> {
    if text::line_prefix(text, position).ends_with('|') {
        return catalog
            .types()
            .iter()
            .map(|ty| CompletionItem {
                label: (*ty).to_string(),
                kind: CompletionItemKind::TypeParameter,
                detail: Some(format!("{ty} type")),
            })
            .collect();
    }

    let builtins = catalog.builtins().iter().map(|name| CompletionItem {
        label: (*name).to_string(),
        kind: CompletionItemKind::Function,
        detail: Some("Built-in function".to_string()),
    });
    let keywords = catalog.keywords().iter().map(|kw| CompletionItem {
        label: (*kw).to_string(),
        kind: CompletionItemKind::Keyword,
        detail: None,
    });
    builtins.chain(keywords).collect()
}
