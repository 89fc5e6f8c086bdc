//! Per-dialect analysis engines.
//!
//! Every engine implements [`Mode`]. Apart from identity, per-document
//! cleanup and disposal, each operation is optional: an engine advertises
//! what it implements through [`Capabilities`], and callers check
//! [`Mode::supports`] before invoking anything. An unsupported operation is
//! skipped, never treated as a failure.

use std::ops::Range as Span;
use std::path::PathBuf;
use std::sync::Arc;

use bitflags::bitflags;
use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, CompletionItem, CompletionList, Diagnostic,
    DocumentHighlight, DocumentLink, FormattingOptions, Hover, Location, Range, SignatureHelp,
    SymbolInformation, TextEdit, Url,
};

use crate::document::{DialectId, DocumentSegmenter, DocumentSnapshot};
use crate::error::Result;
use crate::registry::{ModeRegistry, ModeRegistryBuilder};
use crate::settings::Settings;

mod directives;
mod script;
mod style;
mod template;

pub use directives::{get_directive, DirectiveDef, DIRECTIVES};
pub use script::{ProjectConfig, ScriptMode};
pub use style::StyleMode;
pub use template::TemplateMode;

bitflags! {
    /// Optional operations a mode implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const CONFIGURE = 1 << 0;
        const UPDATE_FILE_INFO = 1 << 1;
        const VALIDATE = 1 << 2;
        const COMPLETE = 1 << 3;
        const RESOLVE_COMPLETION = 1 << 4;
        const HOVER = 1 << 5;
        const SIGNATURE_HELP = 1 << 6;
        const DOCUMENT_HIGHLIGHTS = 1 << 7;
        const DOCUMENT_SYMBOLS = 1 << 8;
        const DOCUMENT_LINKS = 1 << 9;
        const DEFINITION = 1 << 10;
        const REFERENCES = 1 << 11;
        const FORMAT = 1 << 12;
        const DOCUMENT_COLORS = 1 << 13;
        const COLOR_PRESENTATIONS = 1 << 14;
        const DOCUMENT_CHANGED = 1 << 15;
    }
}

/// Resolves link targets found in a document.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    base: Url,
    workspace_root: Option<PathBuf>,
}

impl ResolveContext {
    pub fn new(base: Url, workspace_root: Option<PathBuf>) -> Self {
        Self {
            base,
            workspace_root,
        }
    }

    /// Resolve `reference` relative to the document.
    pub fn resolve(&self, reference: &str) -> Option<Url> {
        self.base.join(reference).ok()
    }

    /// Resolve `path` relative to the workspace root.
    pub fn resolve_in_workspace(&self, path: &str) -> Option<Url> {
        let root = self.workspace_root.as_ref()?;
        Url::from_file_path(root.join(path)).ok()
    }
}

/// An analysis engine for one or more dialects.
///
/// Optional operations have empty default bodies; they are only called when
/// the matching [`Capabilities`] flag is set.
pub trait Mode: Send + Sync {
    fn id(&self) -> DialectId;

    fn capabilities(&self) -> Capabilities;

    fn supports(&self, capability: Capabilities) -> bool {
        self.capabilities().contains(capability)
    }

    fn configure(&self, _settings: &Settings) {}

    fn update_file_info(&self, _doc: &DocumentSnapshot) {}

    fn validate(&self, _doc: &DocumentSnapshot) -> Result<Vec<Diagnostic>> {
        Ok(Vec::new())
    }

    fn complete(&self, _doc: &DocumentSnapshot, _offset: usize) -> Result<CompletionList> {
        Ok(CompletionList::default())
    }

    fn resolve_completion(
        &self,
        _doc: &DocumentSnapshot,
        item: CompletionItem,
    ) -> Result<CompletionItem> {
        Ok(item)
    }

    fn hover(&self, _doc: &DocumentSnapshot, _offset: usize) -> Result<Option<Hover>> {
        Ok(None)
    }

    fn signature_help(
        &self,
        _doc: &DocumentSnapshot,
        _offset: usize,
    ) -> Result<Option<SignatureHelp>> {
        Ok(None)
    }

    fn document_highlights(
        &self,
        _doc: &DocumentSnapshot,
        _offset: usize,
    ) -> Result<Vec<DocumentHighlight>> {
        Ok(Vec::new())
    }

    fn document_symbols(&self, _doc: &DocumentSnapshot) -> Result<Vec<SymbolInformation>> {
        Ok(Vec::new())
    }

    fn document_links(
        &self,
        _doc: &DocumentSnapshot,
        _context: &ResolveContext,
    ) -> Result<Vec<DocumentLink>> {
        Ok(Vec::new())
    }

    fn definition(&self, _doc: &DocumentSnapshot, _offset: usize) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    fn references(&self, _doc: &DocumentSnapshot, _offset: usize) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    /// Format the bytes in `span`.
    fn format(
        &self,
        _doc: &DocumentSnapshot,
        _span: Span<usize>,
        _options: &FormattingOptions,
    ) -> Result<Vec<TextEdit>> {
        Ok(Vec::new())
    }

    fn document_colors(&self, _doc: &DocumentSnapshot) -> Result<Vec<ColorInformation>> {
        Ok(Vec::new())
    }

    fn color_presentations(
        &self,
        _doc: &DocumentSnapshot,
        _color: Color,
        _range: Range,
    ) -> Result<Vec<ColorPresentation>> {
        Ok(Vec::new())
    }

    /// A document changed outside the editor.
    fn on_document_changed(&self, _uri: &Url) {}

    /// Release per-document state.
    fn on_document_removed(&self, doc: &DocumentSnapshot);

    /// Release everything. Called at most once.
    fn dispose(&self);
}

/// Build the registry of built-in modes for the enabled dialects.
///
/// The script mode is constructed asynchronously since it reads the
/// project configuration from `workspace_root`.
pub async fn build_registry(
    settings: &Settings,
    workspace_root: Option<PathBuf>,
) -> Result<ModeRegistry> {
    let cache = settings.cache.to_config();
    let segmenter = Arc::new(DocumentSegmenter::new(cache));
    let mut builder = ModeRegistryBuilder::new(Arc::clone(&segmenter));

    if settings.dialects.is_enabled(DialectId::VueHtml) {
        builder = builder.register(
            &[DialectId::VueHtml],
            Arc::new(TemplateMode::new(Arc::clone(&segmenter))),
        );
    }

    for dialect in DialectId::STYLES {
        if settings.dialects.is_enabled(dialect) {
            builder = builder.register(
                &[dialect],
                Arc::new(StyleMode::new(dialect, Arc::clone(&segmenter))),
            );
        }
    }

    let scripts: Vec<DialectId> = DialectId::SCRIPTS
        .into_iter()
        .filter(|d| settings.dialects.is_enabled(*d))
        .collect();
    if !scripts.is_empty() {
        let segmenter = Arc::clone(&segmenter);
        builder = builder.register_async(&scripts, async move {
            let mode = ScriptMode::load(segmenter, workspace_root, cache).await?;
            Ok(Arc::new(mode) as Arc<dyn Mode>)
        });
    }

    let registry = builder.build().await?;
    registry.configure(settings);
    Ok(registry)
}

/// Byte span of the word around `offset`, where words are runs of bytes
/// matching `is_word`.
pub(crate) fn word_at(
    text: &str,
    offset: usize,
    is_word: impl Fn(u8) -> bool,
) -> Option<Span<usize>> {
    let bytes = text.as_bytes();
    let offset = offset.min(bytes.len());
    let mut start = offset;
    while start > 0 && is_word(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = offset;
    while end < bytes.len() && is_word(bytes[end]) {
        end += 1;
    }
    (start < end).then_some(start..end)
}
