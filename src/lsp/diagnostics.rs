//! Diagnostics across every region of a document.

use tower_lsp::lsp_types::Diagnostic;

use super::{modes_supporting, or_log};
use crate::document::DocumentSnapshot;
use crate::modes::Capabilities;
use crate::registry::ModeRegistry;

/// Validate `doc` with each distinct mode that has a region in it.
///
/// A mode spanning several regions is asked once. Failures are logged and
/// skipped.
pub fn collect_diagnostics(registry: &ModeRegistry, doc: &DocumentSnapshot) -> Vec<Diagnostic> {
    modes_supporting(registry, doc, Capabilities::VALIDATE)
        .iter()
        .flat_map(|mode| or_log(mode.as_ref(), "validate", mode.validate(doc)))
        .collect()
}
