//! Language server for single-file components.
//!
//! A component file mixes markup, stylesheet and script blocks. Each open
//! document is segmented into dialect regions and every request is routed
//! to the language mode registered for the dialect under the cursor.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};
use tracing::{debug, error, info, warn};

mod cache;
mod document;
mod error;
mod lsp;
mod modes;
mod registry;
mod settings;

pub use cache::{CacheConfig, VersionedModelCache};
pub use document::{
    scan_regions, DialectId, DocumentRegionModel, DocumentSegmenter, DocumentSnapshot,
    DocumentStore, LanguageRange, LineIndex,
};
pub use error::Error;
pub use lsp::{collect_diagnostics, server_capabilities};
pub use modes::{
    build_registry, get_directive, Capabilities, DirectiveDef, Mode, ProjectConfig,
    ResolveContext, ScriptMode, StyleMode, TemplateMode, DIRECTIVES,
};
pub use registry::{ModeRegistry, ModeRegistryBuilder, RegistryPhase, RegistrySlot};
pub use settings::{discover_settings, load_settings, Settings, SETTINGS_FILE};

pub struct Backend {
    client: Client,
    documents: DocumentStore,
    registry: RegistrySlot,
    /// Settings discovered from `sfc-lsp.toml`.
    file_settings: Mutex<Settings>,
    /// File settings with the client's latest `sfc` section layered on top.
    settings: Mutex<Settings>,
    workspace_root: OnceLock<PathBuf>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: DocumentStore::new(),
            registry: RegistrySlot::new(),
            file_settings: Mutex::new(Settings::default()),
            settings: Mutex::new(Settings::default()),
            workspace_root: OnceLock::new(),
        }
    }

    /// The registry, or `None` while it is unavailable.
    fn registry(&self) -> Option<Arc<ModeRegistry>> {
        match self.registry.get() {
            Ok(registry) => Some(registry),
            Err(e) => {
                debug!(error = %e, "request ignored");
                None
            }
        }
    }

    /// Registry and latest snapshot for a request on `uri`.
    fn context(&self, uri: &Url) -> Option<(Arc<ModeRegistry>, Arc<DocumentSnapshot>)> {
        let registry = self.registry()?;
        let doc = self.documents.get(uri)?;
        Some((registry, doc))
    }

    async fn initialize_registry(&self) {
        if !self.registry.begin_initializing() {
            return;
        }
        let settings = self.settings.lock().clone();
        let workspace_root = self.workspace_root.get().cloned();

        match modes::build_registry(&settings, workspace_root).await {
            Ok(registry) => {
                registry.segmenter().spawn_sweeper();
                if self.registry.set_ready(registry) {
                    self.publish_all().await;
                }
            }
            Err(e) => {
                error!(error = %e, "failed to initialize language modes");
                self.registry.fail();
                self.client
                    .show_message(MessageType::ERROR, format!("sfc-lsp: {e}"))
                    .await;
            }
        }
    }

    /// Store a new snapshot and publish its diagnostics.
    async fn on_document_change(&self, uri: Url, text: String, version: i32) {
        let doc = self.documents.open(uri, text, version);
        if let Some(registry) = self.registry() {
            registry.update_file_info(&doc);
            self.publish_diagnostics_for(&registry, &doc).await;
        }
    }

    async fn publish_diagnostics_for(&self, registry: &ModeRegistry, doc: &DocumentSnapshot) {
        let diagnostics = lsp::collect_diagnostics(registry, doc);
        self.client
            .publish_diagnostics(doc.uri.clone(), diagnostics, Some(doc.version))
            .await;
    }

    /// Re-index and re-validate every open document.
    async fn publish_all(&self) {
        let Some(registry) = self.registry() else {
            return;
        };
        for doc in self.documents.snapshots() {
            registry.update_file_info(&doc);
            self.publish_diagnostics_for(&registry, &doc).await;
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            let (settings, settings_dir) = settings::discover_settings(&root);
            info!(root = %root.display(), settings = %settings_dir.display(), "workspace");
            *self.file_settings.lock() = settings.clone();
            *self.settings.lock() = settings;
            let _ = self.workspace_root.set(root);
        }

        Ok(InitializeResult {
            capabilities: lsp::server_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.initialize_registry().await;
        self.client
            .log_message(MessageType::INFO, "sfc language server initialized")
            .await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        self.registry.shutdown();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.on_document_change(
            params.text_document.uri,
            params.text_document.text,
            params.text_document.version,
        )
        .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            self.on_document_change(
                params.text_document.uri,
                change.text,
                params.text_document.version,
            )
            .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(doc) = self.documents.close(&uri) {
            if let Some(registry) = self.registry() {
                registry.document_closed(&doc);
            }
        }
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let file_settings = self.file_settings.lock().clone();
        let settings = match file_settings.with_overrides(params.settings) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("configuration change carries no sfc section");
                return;
            }
            Err(e) => {
                warn!(error = %e, "ignoring configuration change");
                return;
            }
        };
        *self.settings.lock() = settings.clone();
        if let Some(registry) = self.registry() {
            registry.configure(&settings);
            self.publish_all().await;
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let Some(registry) = self.registry() else {
            return;
        };
        for change in params.changes {
            debug!(uri = %change.uri, kind = ?change.typ, "watched file changed");
            registry.document_changed(&change.uri);
        }
    }

    async fn hover(&self, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let Some((registry, doc)) = self.context(&position.text_document.uri) else {
            return Ok(None);
        };
        Ok(lsp::hover(&registry, &doc, position.position))
    }

    async fn completion(
        &self,
        params: CompletionParams,
    ) -> jsonrpc::Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let Some((registry, doc)) = self.context(&position.text_document.uri) else {
            return Ok(None);
        };
        Ok(lsp::completion(&registry, &doc, position.position))
    }

    async fn completion_resolve(&self, item: CompletionItem) -> jsonrpc::Result<CompletionItem> {
        let Some(registry) = self.registry() else {
            return Ok(item);
        };
        Ok(lsp::resolve_completion(&registry, &self.documents, item))
    }

    async fn signature_help(
        &self,
        params: SignatureHelpParams,
    ) -> jsonrpc::Result<Option<SignatureHelp>> {
        let position = params.text_document_position_params;
        let Some((registry, doc)) = self.context(&position.text_document.uri) else {
            return Ok(None);
        };
        Ok(lsp::signature_help(&registry, &doc, position.position))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let Some((registry, doc)) = self.context(&position.text_document.uri) else {
            return Ok(None);
        };
        Ok(lsp::definition(&registry, &doc, position.position))
    }

    async fn references(&self, params: ReferenceParams) -> jsonrpc::Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        let Some((registry, doc)) = self.context(&position.text_document.uri) else {
            return Ok(None);
        };
        Ok(lsp::references(&registry, &doc, position.position))
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> jsonrpc::Result<Option<Vec<DocumentHighlight>>> {
        let position = params.text_document_position_params;
        let Some((registry, doc)) = self.context(&position.text_document.uri) else {
            return Ok(None);
        };
        Ok(lsp::document_highlights(&registry, &doc, position.position))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        let Some((registry, doc)) = self.context(&params.text_document.uri) else {
            return Ok(None);
        };
        let symbols = lsp::document_symbols(&registry, &doc);
        Ok(Some(DocumentSymbolResponse::Flat(symbols)))
    }

    async fn document_link(
        &self,
        params: DocumentLinkParams,
    ) -> jsonrpc::Result<Option<Vec<DocumentLink>>> {
        let Some((registry, doc)) = self.context(&params.text_document.uri) else {
            return Ok(None);
        };
        let context = ResolveContext::new(doc.uri.clone(), self.workspace_root.get().cloned());
        Ok(Some(lsp::document_links(&registry, &doc, &context)))
    }

    async fn formatting(
        &self,
        params: DocumentFormattingParams,
    ) -> jsonrpc::Result<Option<Vec<TextEdit>>> {
        let Some((registry, doc)) = self.context(&params.text_document.uri) else {
            return Ok(None);
        };
        Ok(Some(lsp::format(&registry, &doc, &params.options)))
    }

    async fn document_color(
        &self,
        params: DocumentColorParams,
    ) -> jsonrpc::Result<Vec<ColorInformation>> {
        let Some((registry, doc)) = self.context(&params.text_document.uri) else {
            return Ok(Vec::new());
        };
        Ok(lsp::document_colors(&registry, &doc))
    }

    async fn color_presentation(
        &self,
        params: ColorPresentationParams,
    ) -> jsonrpc::Result<Vec<ColorPresentation>> {
        let Some((registry, doc)) = self.context(&params.text_document.uri) else {
            return Ok(Vec::new());
        };
        Ok(lsp::color_presentations(
            &registry,
            &doc,
            params.color,
            params.range,
        ))
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}
