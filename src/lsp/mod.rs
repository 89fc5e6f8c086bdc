//! LSP feature implementations on top of the mode registry.
//!
//! Each feature resolves the mode(s) responsible for a request and checks
//! the matching capability before calling in. A failing mode is logged and
//! contributes nothing; the other regions of the document are unaffected.

use std::sync::Arc;

use tower_lsp::lsp_types::Position;
use tracing::warn;

use crate::document::{DialectId, DocumentSnapshot};
use crate::error::Result;
use crate::modes::{Capabilities, Mode};
use crate::registry::ModeRegistry;

mod capabilities;
mod completion;
mod diagnostics;
mod document;
mod hover;
mod navigation;

pub use capabilities::server_capabilities;
pub use completion::{completion, resolve_completion};
pub use diagnostics::collect_diagnostics;
pub use document::{
    color_presentations, document_colors, document_links, document_symbols, format,
};
pub use hover::{hover, signature_help};
pub use navigation::{definition, document_highlights, references};

/// The mode handling a position request.
pub(crate) struct Target {
    pub mode: Arc<dyn Mode>,
    pub dialect: DialectId,
    pub offset: usize,
}

/// Resolve the mode at `position`, provided it supports `capability`.
pub(crate) fn target_at(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    position: Position,
    capability: Capabilities,
) -> Option<Target> {
    let offset = doc.line_index().position_to_offset(position)?;
    let model = match registry.segmenter().segment(doc) {
        Ok(model) => model,
        Err(e) => {
            warn!(uri = %doc.uri, error = %e, "failed to segment document");
            return None;
        }
    };
    let dialect = model.dialect_at(offset);
    let mode = registry.lookup(dialect)?;
    mode.supports(capability).then_some(Target {
        mode,
        dialect,
        offset,
    })
}

/// Unwrap a mode result, logging failures and substituting the empty value.
pub(crate) fn or_log<T: Default>(mode: &dyn Mode, operation: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(mode = %mode.id(), operation, error = %e, "mode request failed");
        T::default()
    })
}

/// Every distinct mode present in `doc` that supports `capability`.
pub(crate) fn modes_supporting(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    capability: Capabilities,
) -> Vec<Arc<dyn Mode>> {
    match registry.modes_in_document(doc) {
        Ok(modes) => modes.into_iter().filter(|m| m.supports(capability)).collect(),
        Err(e) => {
            warn!(uri = %doc.uri, error = %e, "failed to segment document");
            Vec::new()
        }
    }
}
