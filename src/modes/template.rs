//! Mode for the HTML template block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, Diagnostic, DiagnosticSeverity,
    DocumentHighlight, DocumentHighlightKind, Documentation, Hover, HoverContents, MarkupContent,
    MarkupKind,
};

use super::directives::{format_directive_docs, get_directive, DIRECTIVES};
use super::{word_at, Capabilities, Mode};
use crate::document::{DialectId, DocumentSegmenter, DocumentSnapshot};
use crate::error::Result;
use crate::settings::Settings;

static TAG_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?([A-Za-z][\w-]*)").unwrap());

pub struct TemplateMode {
    segmenter: Arc<DocumentSegmenter>,
    validate: AtomicBool,
}

impl TemplateMode {
    pub fn new(segmenter: Arc<DocumentSegmenter>) -> Self {
        Self {
            segmenter,
            validate: AtomicBool::new(true),
        }
    }

    /// The document text with everything but template markup blanked out.
    fn markup(&self, doc: &DocumentSnapshot) -> Result<String> {
        let model = self.segmenter.segment(doc)?;
        Ok(model.embedded_text(doc.text(), |d| d == DialectId::VueHtml))
    }
}

fn is_attribute_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'@' | b'#' | b'.' | b'_')
}

impl Mode for TemplateMode {
    fn id(&self) -> DialectId {
        DialectId::VueHtml
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CONFIGURE
            | Capabilities::VALIDATE
            | Capabilities::COMPLETE
            | Capabilities::RESOLVE_COMPLETION
            | Capabilities::HOVER
            | Capabilities::DOCUMENT_HIGHLIGHTS
    }

    fn configure(&self, settings: &Settings) {
        self.validate
            .store(settings.template.validate, Ordering::Relaxed);
    }

    /// Reports `{{` interpolations that are never closed.
    fn validate(&self, doc: &DocumentSnapshot) -> Result<Vec<Diagnostic>> {
        if !self.validate.load(Ordering::Relaxed) {
            return Ok(Vec::new());
        }
        let markup = self.markup(doc)?;
        let line_index = doc.line_index();

        let mut diagnostics = Vec::new();
        let mut pos = 0;
        while let Some(found) = markup[pos..].find("{{") {
            let open = pos + found;
            match markup[open + 2..].find("}}") {
                Some(close) => pos = open + 2 + close + 2,
                None => {
                    diagnostics.push(Diagnostic {
                        range: line_index.span_to_range(&(open..open + 2)),
                        severity: Some(DiagnosticSeverity::ERROR),
                        source: Some(DialectId::VueHtml.to_string()),
                        message: "Interpolation is missing its closing `}}`".to_string(),
                        ..Default::default()
                    });
                    break;
                }
            }
        }
        Ok(diagnostics)
    }

    /// Offers built-in directives once the attribute being typed starts with `v-`.
    fn complete(&self, doc: &DocumentSnapshot, offset: usize) -> Result<CompletionList> {
        let text = doc.text();
        let offset = offset.min(text.len());
        let start = text.as_bytes()[..offset]
            .iter()
            .rposition(|b| !is_attribute_byte(*b))
            .map_or(0, |p| p + 1);
        let prefix = &text[start..offset];
        if !prefix.starts_with("v-") {
            return Ok(CompletionList::default());
        }

        let items = DIRECTIVES
            .iter()
            .filter(|d| d.name.starts_with(prefix))
            .map(|d| CompletionItem {
                label: d.name.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                detail: Some(d.expects.to_string()),
                ..Default::default()
            })
            .collect();
        Ok(CompletionList {
            is_incomplete: false,
            items,
        })
    }

    /// Attaches the directive documentation left out of the completion list.
    fn resolve_completion(
        &self,
        _doc: &DocumentSnapshot,
        mut item: CompletionItem,
    ) -> Result<CompletionItem> {
        if item.documentation.is_none() {
            if let Some(directive) = get_directive(&item.label) {
                item.documentation = Some(Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: format_directive_docs(directive),
                }));
            }
        }
        Ok(item)
    }

    fn hover(&self, doc: &DocumentSnapshot, offset: usize) -> Result<Option<Hover>> {
        let text = doc.text();
        let Some(span) = word_at(text, offset, is_attribute_byte) else {
            return Ok(None);
        };
        let Some(directive) = get_directive(&text[span.clone()]) else {
            return Ok(None);
        };
        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format_directive_docs(directive),
            }),
            range: Some(doc.line_index().span_to_range(&span)),
        }))
    }

    /// Highlights every open and close tag sharing the name under the cursor.
    fn document_highlights(
        &self,
        doc: &DocumentSnapshot,
        offset: usize,
    ) -> Result<Vec<DocumentHighlight>> {
        let markup = self.markup(doc)?;
        let tags: Vec<_> = TAG_NAME
            .captures_iter(&markup)
            .filter_map(|c| c.get(1))
            .collect();
        let Some(target) = tags
            .iter()
            .find(|m| m.start() <= offset && offset <= m.end())
            .map(|m| m.as_str())
        else {
            return Ok(Vec::new());
        };

        let line_index = doc.line_index();
        Ok(tags
            .iter()
            .filter(|m| m.as_str() == target)
            .map(|m| DocumentHighlight {
                range: line_index.span_to_range(&m.range()),
                kind: Some(DocumentHighlightKind::TEXT),
            })
            .collect())
    }

    fn on_document_removed(&self, _doc: &DocumentSnapshot) {}

    fn dispose(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Position, Url};

    fn setup(text: &str) -> (TemplateMode, DocumentSnapshot) {
        let mode = TemplateMode::new(Arc::new(DocumentSegmenter::default()));
        let doc = DocumentSnapshot::new(Url::parse("file:///App.vue").unwrap(), 1, text);
        (mode, doc)
    }

    #[test]
    fn unterminated_interpolation_is_reported() {
        let (mode, doc) = setup("<template>\n  <p>{{ ok }} {{ broken</p>\n</template>");
        let diagnostics = mode.validate(&doc).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range.start, Position::new(1, 14));
    }

    #[test]
    fn validation_can_be_disabled() {
        let (mode, doc) = setup("<template>{{</template>");
        let mut settings = Settings::default();
        settings.template.validate = false;
        mode.configure(&settings);
        assert!(mode.validate(&doc).unwrap().is_empty());
    }

    #[test]
    fn completes_directives_by_prefix() {
        let text = "<template><div v-el></div></template>";
        let (mode, doc) = setup(text);
        let offset = text.find("v-el").unwrap() + 4;
        let labels: Vec<_> = mode
            .complete(&doc, offset)
            .unwrap()
            .items
            .into_iter()
            .map(|i| i.label)
            .collect();
        assert_eq!(labels, vec!["v-else", "v-else-if"]);
    }

    #[test]
    fn resolve_adds_documentation() {
        let text = "<template><div v-sh></div></template>";
        let (mode, doc) = setup(text);
        let item = mode
            .complete(&doc, text.find("v-sh").unwrap() + 4)
            .unwrap()
            .items
            .remove(0);
        assert!(item.documentation.is_none());

        let resolved = mode.resolve_completion(&doc, item).unwrap();
        let Some(Documentation::MarkupContent(markup)) = resolved.documentation else {
            panic!("expected markdown documentation");
        };
        assert!(markup.value.starts_with("**v-show**"));
    }

    #[test]
    fn no_completion_outside_directive_prefix() {
        let text = "<template><div cla></div></template>";
        let (mode, doc) = setup(text);
        let offset = text.find("cla").unwrap() + 3;
        assert!(mode.complete(&doc, offset).unwrap().items.is_empty());
    }

    #[test]
    fn hover_on_shorthand() {
        let text = "<template><a @click=\"go\"></a></template>";
        let (mode, doc) = setup(text);
        let hover = mode.hover(&doc, text.find("@click").unwrap() + 2).unwrap();
        let Some(Hover {
            contents: HoverContents::Markup(markup),
            ..
        }) = hover
        else {
            panic!("expected markdown hover");
        };
        assert!(markup.value.starts_with("**v-on**"));
    }

    #[test]
    fn highlights_matching_tags() {
        let text = "<template><ul><li>a</li><li>b</li></ul></template>";
        let (mode, doc) = setup(text);
        let highlights = mode.document_highlights(&doc, text.find("li").unwrap()).unwrap();
        assert_eq!(highlights.len(), 4);
    }
}
