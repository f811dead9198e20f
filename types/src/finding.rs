use std::path::Path;
use std::slice;
use std::vec;

/// End column used when the toolchain reports no column precision.
///
/// Large enough that editors clamp it to the end of the line.
pub const FULL_LINE_END: u32 = 1000;

/// Severity level for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error = 1,
    Warning = 2,
    Info = 3,
}

impl Severity {
    /// LSP numeric severity (1=Error, 2=Warning, 3=Information).
    #[must_use]
    pub fn to_lsp(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// A single line-addressed finding produced from toolchain output.
///
/// Fields are private; a finding is immutable once created. Consumers read
/// via accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    severity: Severity,
    message: String,
    /// 0-indexed line number.
    line: u32,
    /// 0-indexed start column.
    start_col: u32,
    /// 0-indexed exclusive end column.
    end_col: u32,
}

impl Finding {
    /// Construct a finding covering `start_col..end_col` of `line`.
    ///
    /// A reversed range is normalized so that `start_col <= end_col`.
    #[must_use]
    pub fn new(severity: Severity, message: String, line: u32, start_col: u32, end_col: u32) -> Self {
        let (start_col, end_col) = if start_col <= end_col {
            (start_col, end_col)
        } else {
            (end_col, start_col)
        };
        Self {
            severity,
            message,
            line,
            start_col,
            end_col,
        }
    }

    /// Construct a finding that marks the whole of `line`.
    #[must_use]
    pub fn whole_line(severity: Severity, message: String, line: u32) -> Self {
        Self::new(severity, message, line, 0, FULL_LINE_END)
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 0-indexed line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn start_col(&self) -> u32 {
        self.start_col
    }

    #[must_use]
    pub fn end_col(&self) -> u32 {
        self.end_col
    }

    /// Format as `path:line: severity: message` (1-indexed for display).
    #[must_use]
    pub fn display_with_path(&self, path: &Path) -> String {
        format!(
            "{}:{}: {}: {}",
            path.display(),
            self.line + 1,
            self.severity.label(),
            self.message,
        )
    }
}

/// The ordered findings of one validation run for one document.
///
/// A set is produced atomically and always replaces the previous set for the
/// document; sets are never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingSet(Vec<Finding>);

impl FindingSet {
    #[must_use]
    pub fn new(findings: Vec<Finding>) -> Self {
        Self(findings)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> slice::Iter<'_, Finding> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Finding] {
        &self.0
    }

    #[must_use]
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.0.iter().filter(|f| f.severity() == severity).count()
    }
}

impl FromIterator<Finding> for FindingSet {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FindingSet {
    type Item = Finding;
    type IntoIter = vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FindingSet {
    type Item = &'a Finding;
    type IntoIter = slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
