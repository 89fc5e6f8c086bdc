//! Completion and completion item resolution.
//!
//! Items carry the document and dialect they were produced for in their
//! `data` field so `completionItem/resolve` can find the same mode again.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{CompletionItem, CompletionResponse, Position, Url};
use tracing::warn;

use super::{or_log, target_at};
use crate::document::{DialectId, DocumentSnapshot, DocumentStore};
use crate::modes::Capabilities;
use crate::registry::ModeRegistry;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionData {
    uri: Url,
    language_id: String,
}

/// Completion items from the mode at `position`.
pub fn completion(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    position: Position,
) -> Option<CompletionResponse> {
    let target = target_at(registry, doc, position, Capabilities::COMPLETE)?;
    let mut list = or_log(
        target.mode.as_ref(),
        "complete",
        target.mode.complete(doc, target.offset),
    );
    if list.items.is_empty() {
        return None;
    }

    let data = serde_json::to_value(CompletionData {
        uri: doc.uri.clone(),
        language_id: target.dialect.as_str().to_string(),
    })
    .ok();
    for item in &mut list.items {
        if item.data.is_none() {
            item.data = data.clone();
        }
    }
    Some(CompletionResponse::List(list))
}

/// Let the mode that produced `item` fill in deferred details.
///
/// Items that cannot be traced back to an open document and a registered
/// mode are returned unchanged.
pub fn resolve_completion(
    registry: &ModeRegistry,
    documents: &DocumentStore,
    item: CompletionItem,
) -> CompletionItem {
    let Some(data) = item
        .data
        .clone()
        .and_then(|data| serde_json::from_value::<CompletionData>(data).ok())
    else {
        return item;
    };
    let Some(doc) = documents.get(&data.uri) else {
        return item;
    };
    let Some(mode) = DialectId::from_language_id(&data.language_id)
        .and_then(|dialect| registry.lookup(dialect))
        .filter(|mode| mode.supports(Capabilities::RESOLVE_COMPLETION))
    else {
        return item;
    };

    match mode.resolve_completion(&doc, item.clone()) {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(mode = %mode.id(), error = %e, "completion resolve failed");
            item
        }
    }
}
