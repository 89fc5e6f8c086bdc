//! Immutable document snapshots and the store of open documents.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use super::text::LineIndex;

/// One point-in-time state of a document.
///
/// A new edit produces a new snapshot with a higher version for the same URI.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: Url,
    pub version: i32,
    text: Arc<str>,
    line_index: LineIndex,
}

impl DocumentSnapshot {
    pub fn new(uri: Url, version: i32, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let line_index = LineIndex::new(Arc::clone(&text));
        Self {
            uri,
            version,
            text,
            line_index,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }
}

/// Thread-safe storage for open documents, holding the latest snapshot of each.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<DocumentSnapshot>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new snapshot for `uri`, replacing the previous one.
    pub fn open(&self, uri: Url, text: String, version: i32) -> Arc<DocumentSnapshot> {
        let snapshot = Arc::new(DocumentSnapshot::new(uri.clone(), version, text));
        self.documents.insert(uri, Arc::clone(&snapshot));
        snapshot
    }

    /// Remove a document, returning its last snapshot.
    pub fn close(&self, uri: &Url) -> Option<Arc<DocumentSnapshot>> {
        self.documents.remove(uri).map(|(_, snapshot)| snapshot)
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<DocumentSnapshot>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }

    /// Latest snapshot of every open document.
    pub fn snapshots(&self) -> Vec<Arc<DocumentSnapshot>> {
        self.documents.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
