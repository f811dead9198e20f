//! Static knowledge about the J language used by hover and completion.

/// Read-only language tables injected into the server.
pub trait Catalog: Send + Sync + 'static {
    /// Markdown documentation for `word`, if it is documented.
    fn documentation(&self, word: &str) -> Option<&str>;

    /// Type names offered after a `|` type annotation.
    fn types(&self) -> &[&str];

    /// Built-in function names.
    fn builtins(&self) -> &[&str];

    fn keywords(&self) -> &[&str];
}

/// The tables shipped with the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCatalog;

const DOCUMENTATION: &[(&str, &str)] = &[
    ("out", "Print output to console\n\nUsage: `out(value)`"),
    ("len", "Get length of a collection\n\nUsage: `len(list)`"),
    ("sum", "Sum all elements in a list\n\nUsage: `sum(numbers)`"),
    ("max", "Get maximum value\n\nUsage: `max(list)`"),
    ("min", "Get minimum value\n\nUsage: `min(list)`"),
    ("range", "Create a range of numbers\n\nUsage: `range(start, end)`"),
    ("map", "Apply function to all elements\n\nUsage: `list.map(function)`"),
    (
        "filter",
        "Filter elements by predicate\n\nUsage: `list.filter(predicate)`",
    ),
    (
        "group_by",
        "Group elements by key function\n\nUsage: `group_by(list, key_fn)`",
    ),
    (
        "partition",
        "Split list by predicate\n\nUsage: `partition(list, predicate)`",
    ),
];

const TYPES: &[&str] = &[
    "int", "float", "str", "bool", "list", "dict", "set", "tuple", "counter", "grid",
];

const BUILTINS: &[&str] = &[
    "out", "print", "len", "sum", "max", "min", "range", "map", "filter", "reduce",
];

const KEYWORDS: &[&str] = &[
    "if", "else", "while", "for", "fn", "class", "trait", "module", "import", "async", "await",
];

impl Catalog for StaticCatalog {
    fn documentation(&self, word: &str) -> Option<&str> {
        DOCUMENTATION
            .iter()
            .find(|(name, _)| *name == word)
            .map(|(_, doc)| *doc)
    }

    fn types(&self) -> &[&str] {
        TYPES
    }

    fn builtins(&self) -> &[&str] {
        BUILTINS
    }

    fn keywords(&self) -> &[&str] {
        KEYWORDS
    }
}
