//! Definition, references and highlights.

use tower_lsp::lsp_types::{DocumentHighlight, GotoDefinitionResponse, Location, Position};

use super::{or_log, target_at};
use crate::document::DocumentSnapshot;
use crate::modes::Capabilities;
use crate::registry::ModeRegistry;

pub fn definition(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let target = target_at(registry, doc, position, Capabilities::DEFINITION)?;
    let locations = or_log(
        target.mode.as_ref(),
        "definition",
        target.mode.definition(doc, target.offset),
    );
    match locations.len() {
        0 => None,
        1 => locations.into_iter().next().map(GotoDefinitionResponse::Scalar),
        _ => Some(GotoDefinitionResponse::Array(locations)),
    }
}

pub fn references(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    position: Position,
) -> Option<Vec<Location>> {
    let target = target_at(registry, doc, position, Capabilities::REFERENCES)?;
    let locations = or_log(
        target.mode.as_ref(),
        "references",
        target.mode.references(doc, target.offset),
    );
    (!locations.is_empty()).then_some(locations)
}

pub fn document_highlights(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    position: Position,
) -> Option<Vec<DocumentHighlight>> {
    let target = target_at(registry, doc, position, Capabilities::DOCUMENT_HIGHLIGHTS)?;
    let highlights = or_log(
        target.mode.as_ref(),
        "document_highlights",
        target.mode.document_highlights(doc, target.offset),
    );
    (!highlights.is_empty()).then_some(highlights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::build_registry;
    use crate::settings::Settings;
    use tower_lsp::lsp_types::Url;

    const TEXT: &str = "<template><p>{{ total }}</p></template>\n\
                        <script setup>\nconst total = 2\n</script>";

    fn doc() -> DocumentSnapshot {
        DocumentSnapshot::new(Url::parse("file:///Cart.vue").unwrap(), 1, TEXT)
    }

    #[tokio::test]
    async fn definition_from_template_expression() {
        let registry = build_registry(&Settings::default(), None).await.unwrap();
        let doc = doc();
        let position = doc.line_index().offset_to_position(TEXT.find("total }}").unwrap());

        let Some(GotoDefinitionResponse::Scalar(location)) = definition(&registry, &doc, position)
        else {
            panic!("expected a single definition");
        };
        assert_eq!(location.range.start, Position::new(2, 6));
    }

    #[tokio::test]
    async fn references_include_template_usage() {
        let registry = build_registry(&Settings::default(), None).await.unwrap();
        let doc = doc();
        let position = doc.line_index().offset_to_position(TEXT.rfind("total").unwrap());
        let refs = references(&registry, &doc, position).unwrap();
        assert_eq!(refs.len(), 2);
    }

    #[tokio::test]
    async fn highlights_in_markup_use_template_mode() {
        let registry = build_registry(&Settings::default(), None).await.unwrap();
        let doc = doc();
        let position = doc.line_index().offset_to_position(TEXT.find("p>").unwrap());
        let highlights = document_highlights(&registry, &doc, position).unwrap();
        assert_eq!(highlights.len(), 2);
    }
}
