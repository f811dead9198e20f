//! Diagnostic store: the current finding-set of every document.
//!
//! Validations may finish out of order. Each one takes a [`Ticket`] when it is
//! triggered and presents it with its result; a result is kept only if no
//! later-triggered result has already been stored for the document and the
//! document has not been closed since the ticket was issued.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use jls_types::{DocumentId, FindingSet, Severity};

/// Sequence number of one triggered validation, ordered per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// What `replace` did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    /// The result is now the document's current state.
    Stored,
    /// A newer result is already stored, or the document was closed.
    Stale,
}

#[derive(Debug, Default)]
struct Sequence {
    issued: u64,
    /// Highest ticket whose result was stored.
    applied: u64,
    /// Tickets at or below this were issued before the last close.
    fence: u64,
    /// Tickets issued but not yet presented to `replace`.
    pending: u64,
}

#[derive(Debug, Default)]
struct Inner {
    findings: HashMap<DocumentId, FindingSet>,
    sequences: HashMap<DocumentId, Sequence>,
}

/// Thread-safe map from document to its current finding-set.
///
/// Sets are always replaced wholesale, never merged; an empty set removes the
/// entry.
#[derive(Debug, Default)]
pub struct DiagnosticStore {
    inner: Mutex<Inner>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a half-applied replace.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue the ticket for a validation of `doc` that is about to start.
    pub fn begin(&self, doc: &DocumentId) -> Ticket {
        let mut inner = self.lock();
        let seq = inner.sequences.entry(doc.clone()).or_default();
        seq.issued += 1;
        seq.pending += 1;
        Ticket(seq.issued)
    }

    /// Make `findings` the current set for `doc`, unless `ticket` is stale.
    pub fn replace(&self, doc: &DocumentId, ticket: Ticket, findings: FindingSet) -> Replaced {
        let mut inner = self.lock();
        let Some(seq) = inner.sequences.get_mut(doc) else {
            tracing::debug!(uri = %doc, ticket = ticket.0, "Dropping result for untracked document");
            return Replaced::Stale;
        };
        seq.pending = seq.pending.saturating_sub(1);
        if ticket.0 <= seq.applied || ticket.0 <= seq.fence {
            tracing::debug!(uri = %doc, ticket = ticket.0, "Dropping stale validation result");
            // Last straggler from before a close with nothing issued since.
            if seq.pending == 0 && seq.issued == seq.fence {
                inner.sequences.remove(doc);
            }
            return Replaced::Stale;
        }
        seq.applied = ticket.0;

        if findings.is_empty() {
            inner.findings.remove(doc);
        } else {
            inner.findings.insert(doc.clone(), findings);
        }
        Replaced::Stored
    }

    /// Remove any entry for `doc`. Idempotent.
    pub fn clear(&self, doc: &DocumentId) {
        self.lock().findings.remove(doc);
    }

    /// Clear `doc` and reject every result triggered before now.
    ///
    /// The document's sequence is forgotten once no ticket for it is
    /// outstanding, so closed documents do not accumulate.
    pub fn close(&self, doc: &DocumentId) {
        let mut inner = self.lock();
        inner.findings.remove(doc);
        let forget = match inner.sequences.get_mut(doc) {
            Some(seq) if seq.pending > 0 => {
                seq.fence = seq.issued;
                false
            }
            Some(_) => true,
            None => false,
        };
        if forget {
            inner.sequences.remove(doc);
        }
    }

    /// Current set for `doc`; empty when there is none.
    pub fn get(&self, doc: &DocumentId) -> FindingSet {
        self.lock().findings.get(doc).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let inner = self.lock();
        let mut files: Vec<(DocumentId, FindingSet)> = inner
            .findings
            .iter()
            .map(|(doc, set)| (doc.clone(), set.clone()))
            .collect();
        drop(inner);

        files.sort_by(|a, b| {
            let a_errors = a.1.iter().any(|f| f.severity().is_error());
            let b_errors = b.1.iter().any(|f| f.severity().is_error());
            b_errors.cmp(&a_errors).then_with(|| a.0.cmp(&b.0))
        });

        DiagnosticsSnapshot { files }
    }
}

/// Point-in-time copy of the store, documents with errors first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    files: Vec<(DocumentId, FindingSet)>,
}

impl DiagnosticsSnapshot {
    #[must_use]
    pub fn files(&self) -> &[(DocumentId, FindingSet)] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn count(&self, severity: Severity) -> usize {
        self.files
            .iter()
            .map(|(_, set)| set.count_by_severity(severity))
            .sum()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    #[must_use]
    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    /// Compact `E:n W:m` summary; empty when there is nothing to report.
    #[must_use]
    pub fn status_string(&self) -> String {
        let errors = self.error_count();
        let warnings = self.warning_count();
        match (errors, warnings) {
            (0, 0) => String::new(),
            (e, 0) => format!("E:{e}"),
            (0, w) => format!("W:{w}"),
            (e, w) => format!("E:{e} W:{w}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use jls_types::Finding;

    use super::*;

    fn doc(name: &str) -> DocumentId {
        DocumentId::new(format!("file:///work/{name}"))
    }

    fn set(severity: Severity, lines: &[u32]) -> FindingSet {
        lines
            .iter()
            .map(|&l| Finding::whole_line(severity, format!("problem at line {}", l + 1), l))
            .collect()
    }

    #[test]
    fn replace_overwrites_never_merges() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");

        let t1 = store.begin(&a);
        store.replace(&a, t1, set(Severity::Error, &[1, 2]));
        let t2 = store.begin(&a);
        assert_eq!(
            store.replace(&a, t2, set(Severity::Error, &[7])),
            Replaced::Stored
        );

        let current = store.get(&a);
        assert_eq!(current.len(), 1);
        assert_eq!(current.as_slice()[0].line(), 7);
    }

    #[test]
    fn empty_result_clears_entry() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let t = store.begin(&a);
        store.replace(&a, t, set(Severity::Error, &[0]));
        assert!(!store.snapshot().is_empty());

        let t = store.begin(&a);
        assert_eq!(store.replace(&a, t, FindingSet::empty()), Replaced::Stored);
        assert!(store.get(&a).is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn clear_is_idempotent_and_tolerates_unknown_documents() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        store.clear(&doc("never-seen.j"));

        let t = store.begin(&a);
        store.replace(&a, t, set(Severity::Error, &[3]));
        store.clear(&a);
        store.clear(&a);
        assert!(store.get(&a).is_empty());
    }

    #[test]
    fn older_ticket_is_rejected_after_newer_result() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let first = store.begin(&a);
        let second = store.begin(&a);

        assert_eq!(
            store.replace(&a, second, set(Severity::Error, &[9])),
            Replaced::Stored
        );
        assert_eq!(
            store.replace(&a, first, set(Severity::Error, &[1])),
            Replaced::Stale
        );
        assert_eq!(store.get(&a).as_slice()[0].line(), 9);
    }

    #[test]
    fn in_order_completion_keeps_the_latest() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let first = store.begin(&a);
        let second = store.begin(&a);
        store.replace(&a, first, set(Severity::Error, &[1]));
        store.replace(&a, second, FindingSet::empty());
        assert!(store.get(&a).is_empty());
    }

    #[test]
    fn result_after_close_does_not_resurrect_entry() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let in_flight = store.begin(&a);
        store.close(&a);

        assert_eq!(
            store.replace(&a, in_flight, set(Severity::Error, &[4])),
            Replaced::Stale
        );
        assert!(store.snapshot().is_empty());

        // Reopening issues fresh tickets that are accepted again.
        let reopened = store.begin(&a);
        assert_eq!(
            store.replace(&a, reopened, set(Severity::Error, &[4])),
            Replaced::Stored
        );
    }

    #[test]
    fn close_forgets_documents_with_nothing_pending() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let t = store.begin(&a);
        store.replace(&a, t, set(Severity::Error, &[2]));
        store.close(&a);
        assert!(store.lock().sequences.is_empty());

        store.close(&doc("never-opened.j"));
        assert!(store.lock().sequences.is_empty());
    }

    #[test]
    fn close_keeps_the_fence_until_pending_results_arrive() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let first = store.begin(&a);
        let second = store.begin(&a);
        store.replace(&a, second, set(Severity::Error, &[1]));
        store.close(&a);
        assert_eq!(store.lock().sequences.len(), 1);

        assert_eq!(
            store.replace(&a, first, set(Severity::Error, &[3])),
            Replaced::Stale
        );
        assert!(store.lock().sequences.is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn reopened_document_outlives_a_stale_result_from_before_close() {
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let before = store.begin(&a);
        store.close(&a);
        let after = store.begin(&a);

        assert_eq!(
            store.replace(&a, before, set(Severity::Error, &[0])),
            Replaced::Stale
        );
        assert_eq!(store.lock().sequences.len(), 1);
        assert_eq!(
            store.replace(&a, after, set(Severity::Error, &[5])),
            Replaced::Stored
        );
        assert_eq!(store.get(&a).as_slice()[0].line(), 5);
    }

    #[test]
    fn documents_are_independent() {
        let store = DiagnosticStore::new();
        let (a, b) = (doc("a.j"), doc("b.j"));
        let ta = store.begin(&a);
        let tb = store.begin(&b);
        store.replace(&b, tb, set(Severity::Error, &[0]));
        assert_eq!(
            store.replace(&a, ta, set(Severity::Error, &[5])),
            Replaced::Stored
        );
        store.close(&b);
        assert_eq!(store.get(&a).len(), 1);
        assert!(store.get(&b).is_empty());
    }

    #[test]
    fn snapshot_puts_error_files_first() {
        let store = DiagnosticStore::new();
        let (a, b) = (doc("a.j"), doc("b.j"));
        let t = store.begin(&a);
        store.replace(&a, t, set(Severity::Warning, &[0, 1]));
        let t = store.begin(&b);
        store.replace(&b, t, set(Severity::Error, &[2]));

        let snap = store.snapshot();
        assert_eq!(snap.files()[0].0, b);
        assert_eq!(snap.files()[1].0, a);
        assert_eq!(snap.error_count(), 1);
        assert_eq!(snap.warning_count(), 2);
        assert_eq!(snap.info_count(), 0);
        assert_eq!(snap.status_string(), "E:1 W:2");
    }

    #[test]
    fn status_string_forms() {
        assert_eq!(DiagnosticsSnapshot::default().status_string(), "");
        let store = DiagnosticStore::new();
        let a = doc("a.j");
        let t = store.begin(&a);
        store.replace(&a, t, set(Severity::Error, &[0, 1, 2]));
        assert_eq!(store.snapshot().status_string(), "E:3");
    }
}
