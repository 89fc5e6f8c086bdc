//! Hover and signature help.

use tower_lsp::lsp_types::{Hover, Position, SignatureHelp};

use super::{or_log, target_at};
use crate::document::DocumentSnapshot;
use crate::modes::Capabilities;
use crate::registry::ModeRegistry;

pub fn hover(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    position: Position,
) -> Option<Hover> {
    let target = target_at(registry, doc, position, Capabilities::HOVER)?;
    or_log(target.mode.as_ref(), "hover", target.mode.hover(doc, target.offset))
}

pub fn signature_help(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    position: Position,
) -> Option<SignatureHelp> {
    let target = target_at(registry, doc, position, Capabilities::SIGNATURE_HELP)?;
    or_log(
        target.mode.as_ref(),
        "signature_help",
        target.mode.signature_help(doc, target.offset),
    )
}
