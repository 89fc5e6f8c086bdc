//! Whole-document features: symbols, links, colors and formatting.

use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, DocumentLink, FormattingOptions, Range,
    SymbolInformation, TextEdit,
};
use tracing::warn;

use super::{modes_supporting, or_log, target_at};
use crate::document::DocumentSnapshot;
use crate::modes::{Capabilities, ResolveContext};
use crate::registry::ModeRegistry;

pub fn document_symbols(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
) -> Vec<SymbolInformation> {
    modes_supporting(registry, doc, Capabilities::DOCUMENT_SYMBOLS)
        .iter()
        .flat_map(|mode| or_log(mode.as_ref(), "document_symbols", mode.document_symbols(doc)))
        .collect()
}

pub fn document_links(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    context: &ResolveContext,
) -> Vec<DocumentLink> {
    modes_supporting(registry, doc, Capabilities::DOCUMENT_LINKS)
        .iter()
        .flat_map(|mode| {
            or_log(
                mode.as_ref(),
                "document_links",
                mode.document_links(doc, context),
            )
        })
        .collect()
}

pub fn document_colors(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
) -> Vec<ColorInformation> {
    modes_supporting(registry, doc, Capabilities::DOCUMENT_COLORS)
        .iter()
        .flat_map(|mode| or_log(mode.as_ref(), "document_colors", mode.document_colors(doc)))
        .collect()
}

/// Presentations offered by the mode governing the start of `range`.
pub fn color_presentations(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    color: Color,
    range: Range,
) -> Vec<ColorPresentation> {
    let Some(target) = target_at(registry, doc, range.start, Capabilities::COLOR_PRESENTATIONS)
    else {
        return Vec::new();
    };
    or_log(
        target.mode.as_ref(),
        "color_presentations",
        target.mode.color_presentations(doc, color, range),
    )
}

/// Format each block region with its own mode.
///
/// Expressions embedded in markup attributes are left alone.
pub fn format(
    registry: &ModeRegistry,
    doc: &DocumentSnapshot,
    options: &FormattingOptions,
) -> Vec<TextEdit> {
    let regions = match registry.all_regions_with_modes(doc) {
        Ok(regions) => regions,
        Err(e) => {
            warn!(uri = %doc.uri, error = %e, "failed to segment document");
            return Vec::new();
        }
    };
    regions
        .iter()
        .filter(|(range, mode)| !range.attribute_value && mode.supports(Capabilities::FORMAT))
        .flat_map(|(range, mode)| {
            or_log(mode.as_ref(), "format", mode.format(doc, range.span(), options))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::build_registry;
    use crate::settings::Settings;
    use std::path::PathBuf;
    use tower_lsp::lsp_types::{Position, Url};

    const TEXT: &str = "<template><a :href=\"url\"></a></template>\n\
                        <script>\nimport Card from './Card.vue'\nexport function open() {}\n</script>\n\
                        <style scoped>\n.btn { color: #ff0000; }  \n</style>";

    fn doc() -> DocumentSnapshot {
        DocumentSnapshot::new(Url::parse("file:///app/src/App.vue").unwrap(), 1, TEXT)
    }

    #[tokio::test]
    async fn symbols_from_every_region() {
        let registry = build_registry(&Settings::default(), None).await.unwrap();
        let names: Vec<_> = document_symbols(&registry, &doc())
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["open", ".btn"]);
    }

    #[tokio::test]
    async fn links_resolve_against_document() {
        let registry = build_registry(&Settings::default(), None).await.unwrap();
        let doc = doc();
        let context = ResolveContext::new(doc.uri.clone(), Some(PathBuf::from("/app")));
        let links = document_links(&registry, &doc, &context);
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].target.as_ref().map(|u| u.as_str()),
            Some("file:///app/src/Card.vue")
        );
    }

    #[tokio::test]
    async fn colors_and_presentations() {
        let registry = build_registry(&Settings::default(), None).await.unwrap();
        let doc = doc();
        let colors = document_colors(&registry, &doc);
        assert_eq!(colors.len(), 1);

        let presentations = color_presentations(&registry, &doc, colors[0].color, colors[0].range);
        let labels: Vec<_> = presentations.into_iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["rgb(255, 0, 0)", "#ff0000"]);
    }

    #[tokio::test]
    async fn format_skips_attribute_expressions() {
        let registry = build_registry(&Settings::default(), None).await.unwrap();
        let options = FormattingOptions {
            tab_size: 2,
            insert_spaces: true,
            ..Default::default()
        };
        let edits = format(&registry, &doc(), &options);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range.start, Position::new(6, 24));
        assert_eq!(edits[0].new_text, "");
    }
}
