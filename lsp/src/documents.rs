//! Open documents as last synchronized by the client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use jls_types::{DocumentId, LANGUAGE_ID};

use crate::protocol;

/// One open buffer, full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenDocument {
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl OpenDocument {
    pub(crate) fn is_j(&self) -> bool {
        self.language_id == LANGUAGE_ID
    }
}

/// Documents the client has opened and not yet closed.
#[derive(Debug, Default)]
pub(crate) struct DocumentTable {
    docs: Mutex<HashMap<DocumentId, OpenDocument>>,
}

impl DocumentTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, OpenDocument>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn open(&self, doc: DocumentId, document: OpenDocument) {
        self.lock().insert(doc, document);
    }

    /// Replace the text of an open document. Unknown documents are ignored.
    pub(crate) fn change(&self, doc: &DocumentId, version: i32, text: String) -> bool {
        match self.lock().get_mut(doc) {
            Some(open) => {
                open.version = version;
                open.text = text;
                true
            }
            None => false,
        }
    }

    pub(crate) fn close(&self, doc: &DocumentId) -> Option<OpenDocument> {
        self.lock().remove(doc)
    }

    pub(crate) fn get(&self, doc: &DocumentId) -> Option<OpenDocument> {
        self.lock().get(doc).cloned()
    }

    /// Filesystem path of `doc` if it is open as a J buffer backed by a file.
    pub(crate) fn eligible_path(&self, doc: &DocumentId) -> Option<PathBuf> {
        let is_j = self.lock().get(doc).is_some_and(OpenDocument::is_j);
        if !is_j {
            return None;
        }
        protocol::file_uri_to_path(doc.as_str())
    }
}
