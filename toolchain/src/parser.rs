//! Translation of `check` output into findings.

use std::sync::OnceLock;

use jls_types::{Finding, FindingSet, InvocationOutput, Severity};
use regex::Regex;

/// Phrase the toolchain prints on stdout when a check is clean.
pub const CLEAN_CHECK_SENTINEL: &str = "No syntax errors";

/// Turns the output of one `check` run into a finding-set.
///
/// Implementations never fail: malformed output degrades to fewer findings.
pub trait DiagnosticParser: Send + Sync + 'static {
    fn parse(&self, output: &InvocationOutput) -> FindingSet;
}

/// Line-oriented parser for the toolchain's human-readable stderr.
///
/// Every stderr line containing `line <N>` (case-insensitive) becomes one
/// error finding on document line `N - 1` spanning the whole line, with the
/// stderr line verbatim as its message. Other lines are dropped. A clean-check
/// sentinel on stdout wins over anything on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineNumberParser;

const LINE_NUMBER_PATTERN: &str = r"(?i)line\s+(\d+)";

static LINE_NUMBER: OnceLock<Regex> = OnceLock::new();

// The pattern is a literal, so compiling it cannot fail at runtime once
// `line_number_pattern_compiles` passes.
fn line_number_regex() -> &'static Regex {
    LINE_NUMBER.get_or_init(|| Regex::new(LINE_NUMBER_PATTERN).expect("valid line number regex"))
}

impl LineNumberParser {
    /// 1-based line number reported on `line`, if any.
    ///
    /// Digit runs too large for `u32` are treated as unparseable.
    fn reported_line(line: &str) -> Option<u32> {
        let caps = line_number_regex().captures(line)?;
        caps.get(1)?.as_str().parse().ok()
    }
}

impl DiagnosticParser for LineNumberParser {
    fn parse(&self, output: &InvocationOutput) -> FindingSet {
        if output.stdout.contains(CLEAN_CHECK_SENTINEL) {
            return FindingSet::empty();
        }

        let findings: FindingSet = output
            .stderr
            .lines()
            .filter_map(|line| {
                let reported = Self::reported_line(line)?;
                Some(Finding::whole_line(
                    Severity::Error,
                    line.to_string(),
                    reported.saturating_sub(1),
                ))
            })
            .collect();

        if findings.is_empty() && !output.stderr.trim().is_empty() {
            tracing::debug!(
                stderr_bytes = output.stderr.len(),
                "Toolchain stderr had no recognizable line numbers"
            );
        }

        findings
    }
}
