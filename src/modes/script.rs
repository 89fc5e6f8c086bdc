//! Mode shared by every script dialect.
//!
//! The analysis is lexical: declarations, identifiers and import specifiers
//! are picked out of the script regions with regular expressions and
//! memoized per document version. Declarations of every open document are
//! kept so go-to-definition can cross files.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::ops::Range as Span;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::Regex;
use serde::Deserialize;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, DocumentHighlight, DocumentHighlightKind, DocumentLink, Hover,
    HoverContents, Location, MarkupContent, MarkupKind, ParameterInformation, ParameterLabel,
    Range, SignatureHelp, SignatureInformation, SymbolInformation, SymbolKind, Url,
};
use tracing::{debug, warn};

use super::{word_at, Capabilities, Mode, ResolveContext};
use crate::cache::{CacheConfig, VersionedModelCache};
use crate::document::{DialectId, DocumentSegmenter, DocumentSnapshot};
use crate::error::{Error, Result};
use crate::settings::Settings;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(function\*?|const|let|var|class|interface|type|enum)\s+([A-Za-z_$][\w$]*)")
        .unwrap()
});

static IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b(?:import|from)\s*\(?\s*["']([^"'\n]+)["']"#).unwrap());

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_$][\w$]*").unwrap());

const PROJECT_FILES: [&str; 2] = ["tsconfig.json", "jsconfig.json"];

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Project-wide settings read from `tsconfig.json` / `jsconfig.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    pub root: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    /// Import prefix -> workspace-relative directory, from `compilerOptions.paths`.
    pub aliases: Vec<(String, String)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerOptions {
    base_url: Option<String>,
    #[serde(default)]
    paths: HashMap<String, Vec<String>>,
}

impl ProjectConfig {
    /// Read the first project file found in `root`.
    ///
    /// A missing file yields the default configuration; an unparsable one is
    /// logged and ignored. Other I/O failures are returned.
    pub async fn load(root: Option<&Path>) -> Result<Self> {
        let Some(root) = root else {
            return Ok(Self::default());
        };

        for name in PROJECT_FILES {
            let path = root.join(name);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => return Ok(Self::parse(root, path, &content)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self {
            root: Some(root.to_path_buf()),
            ..Self::default()
        })
    }

    fn parse(root: &Path, path: PathBuf, content: &str) -> Self {
        let file: ProjectFile = match serde_json::from_str(content) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unparsable project file");
                ProjectFile::default()
            }
        };

        let base = file
            .compiler_options
            .base_url
            .as_deref()
            .unwrap_or(".")
            .trim_end_matches('/')
            .to_string();
        let mut aliases: Vec<(String, String)> = file
            .compiler_options
            .paths
            .iter()
            .filter_map(|(pattern, targets)| {
                let target = targets.first()?;
                let prefix = pattern.trim_end_matches('*').to_string();
                let dir = format!("{base}/{}", target.trim_end_matches('*'));
                let dir = dir.trim_start_matches("./").to_string();
                Some((prefix, dir))
            })
            .collect();
        // Longest prefix first so `@/components/` beats `@/`.
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            root: Some(root.to_path_buf()),
            config_file: Some(path),
            aliases,
        }
    }

    /// Rewrite an aliased import specifier to a workspace-relative path.
    pub fn resolve_alias(&self, specifier: &str) -> Option<String> {
        self.aliases.iter().find_map(|(prefix, dir)| {
            let rest = specifier.strip_prefix(prefix.as_str())?;
            Some(format!("{dir}{rest}"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    name: String,
    kind: SymbolKind,
    /// Span of the declared name.
    span: Span<usize>,
}

/// Lexical outline of the script regions of one document version.
#[derive(Debug, Default)]
struct ScriptOutline {
    declarations: Vec<Declaration>,
    /// Spans of import specifiers, without quotes.
    imports: Vec<Span<usize>>,
    identifiers: Vec<Span<usize>>,
}

impl ScriptOutline {
    fn scan(script: &str) -> Self {
        let declarations = DECLARATION
            .captures_iter(script)
            .filter_map(|caps| {
                let keyword = caps.get(1)?.as_str();
                let name = caps.get(2)?;
                let kind = match keyword {
                    "function" | "function*" => SymbolKind::FUNCTION,
                    "const" => SymbolKind::CONSTANT,
                    "class" => SymbolKind::CLASS,
                    "interface" => SymbolKind::INTERFACE,
                    "type" => SymbolKind::TYPE_PARAMETER,
                    "enum" => SymbolKind::ENUM,
                    _ => SymbolKind::VARIABLE,
                };
                Some(Declaration {
                    name: name.as_str().to_string(),
                    kind,
                    span: name.range(),
                })
            })
            .collect();

        let imports = IMPORT
            .captures_iter(script)
            .filter_map(|caps| caps.get(1).map(|m| m.range()))
            .collect();

        let identifiers = IDENTIFIER
            .find_iter(script)
            .filter(|m| {
                // Skip matches glued to a preceding identifier byte, e.g. digits.
                m.start() == 0 || !is_ident_byte(script.as_bytes()[m.start() - 1])
            })
            .map(|m| m.range())
            .collect();

        Self {
            declarations,
            imports,
            identifiers,
        }
    }
}

pub struct ScriptMode {
    segmenter: Arc<DocumentSegmenter>,
    outlines: Arc<VersionedModelCache<ScriptOutline>>,
    project: ProjectConfig,
    /// Declarations of every document seen by `update_file_info`.
    file_info: DashMap<Url, Vec<(String, Range)>>,
    validate: AtomicBool,
}

impl ScriptMode {
    pub fn new(
        segmenter: Arc<DocumentSegmenter>,
        project: ProjectConfig,
        cache: CacheConfig,
    ) -> Self {
        let regions = Arc::clone(&segmenter);
        let outlines = Arc::new(VersionedModelCache::new(
            "script-outline",
            cache,
            move |doc: &DocumentSnapshot| {
                let model = regions.segment(doc)?;
                let script = model.embedded_text(doc.text(), DialectId::is_script);
                Ok(ScriptOutline::scan(&script))
            },
        ));
        outlines.spawn_sweeper();

        Self {
            segmenter,
            outlines,
            project,
            file_info: DashMap::new(),
            validate: AtomicBool::new(true),
        }
    }

    /// Construct the mode after reading the project configuration.
    pub async fn load(
        segmenter: Arc<DocumentSegmenter>,
        workspace_root: Option<PathBuf>,
        cache: CacheConfig,
    ) -> Result<Self> {
        let project = ProjectConfig::load(workspace_root.as_deref())
            .await
            .map_err(|e| Error::ModeInit {
                dialect: DialectId::JavaScript,
                message: e.to_string(),
            })?;
        debug!(
            config = ?project.config_file,
            aliases = project.aliases.len(),
            "loaded project config"
        );
        Ok(Self::new(segmenter, project, cache))
    }

    /// The identifier under `offset` together with the outline it came from.
    fn identifier_at(
        &self,
        doc: &DocumentSnapshot,
        offset: usize,
    ) -> Result<Option<(String, Arc<ScriptOutline>)>> {
        let outline = self.outlines.get(doc)?;
        let found = outline
            .identifiers
            .iter()
            .find(|span| span.start <= offset && offset <= span.end)
            .map(|span| doc.text()[span.clone()].to_string())
            .or_else(|| {
                // The cursor may sit in a gap the lexer skipped.
                word_at(doc.text(), offset, is_ident_byte).map(|s| doc.text()[s].to_string())
            });
        Ok(found.map(|name| (name, outline)))
    }

    fn occurrences<'a>(
        doc: &'a DocumentSnapshot,
        outline: &'a ScriptOutline,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Span<usize>> + 'a {
        outline
            .identifiers
            .iter()
            .filter(move |span| &doc.text()[(*span).clone()] == name)
    }
}

/// Matching opener for a closing bracket.
fn opener(close: u8) -> u8 {
    match close {
        b')' => b'(',
        b']' => b'[',
        _ => b'{',
    }
}

/// The innermost unclosed `(` in `before`, with the number of top-level
/// commas after it.
fn enclosing_call(before: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut commas = 0;
    for (i, b) in before.bytes().enumerate().rev() {
        match b {
            b')' | b']' | b'}' => depth += 1,
            b'(' | b'[' | b'{' if depth == 0 => return (b == b'(').then_some((i, commas)),
            b'(' | b'[' | b'{' => depth -= 1,
            b',' if depth == 0 => commas += 1,
            _ => {}
        }
    }
    None
}

/// Parameters of the list opening at the start of `rest`, split on
/// top-level commas.
fn parameter_list(rest: &str) -> Option<Vec<String>> {
    let inner = rest.trim_start().strip_prefix('(')?;
    let mut depth = 0usize;
    let mut params = Vec::new();
    let mut start = 0;
    for (i, b) in inner.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' if depth == 0 => {
                params.push(inner[start..i].trim().to_string());
                params.retain(|p| !p.is_empty());
                return Some(params);
            }
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                params.push(inner[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    None
}

/// Bracket events outside strings and comments: `(offset, byte)`.
fn brackets(script: &str) -> Vec<(usize, u8)> {
    let bytes = script.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = script[i..].find('\n').map_or(bytes.len(), |p| i + p);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = script[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
                continue;
            }
            quote @ (b'"' | b'\'' | b'`') => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != quote && (quote == b'`' || bytes[j] != b'\n')
                {
                    j += if bytes[j] == b'\\' { 2 } else { 1 };
                }
                i = j + 1;
                continue;
            }
            b @ (b'(' | b'[' | b'{' | b')' | b']' | b'}') => out.push((i, b)),
            _ => {}
        }
        i += 1;
    }
    out
}

impl Mode for ScriptMode {
    fn id(&self) -> DialectId {
        DialectId::JavaScript
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CONFIGURE
            | Capabilities::UPDATE_FILE_INFO
            | Capabilities::VALIDATE
            | Capabilities::HOVER
            | Capabilities::SIGNATURE_HELP
            | Capabilities::DOCUMENT_HIGHLIGHTS
            | Capabilities::DOCUMENT_SYMBOLS
            | Capabilities::DOCUMENT_LINKS
            | Capabilities::DEFINITION
            | Capabilities::REFERENCES
            | Capabilities::DOCUMENT_CHANGED
    }

    fn configure(&self, settings: &Settings) {
        self.validate.store(settings.script.validate, Ordering::Relaxed);
    }

    fn update_file_info(&self, doc: &DocumentSnapshot) {
        let outline = match self.outlines.get(doc) {
            Ok(outline) => outline,
            Err(e) => {
                warn!(uri = %doc.uri, error = %e, "failed to index script declarations");
                return;
            }
        };
        let line_index = doc.line_index();
        let declarations = outline
            .declarations
            .iter()
            .map(|d| (d.name.clone(), line_index.span_to_range(&d.span)))
            .collect();
        self.file_info.insert(doc.uri.clone(), declarations);
    }

    /// Reports unbalanced brackets in each script region.
    fn validate(&self, doc: &DocumentSnapshot) -> Result<Vec<Diagnostic>> {
        if !self.validate.load(Ordering::Relaxed) {
            return Ok(Vec::new());
        }
        let model = self.segmenter.segment(doc)?;
        let text = doc.text();
        let line_index = doc.line_index();
        let diagnostic = |at: usize, message: String| Diagnostic {
            range: line_index.span_to_range(&(at..at + 1)),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some("script".to_string()),
            message,
            ..Default::default()
        };

        let mut diagnostics = Vec::new();
        for range in model.ranges_of(DialectId::is_script) {
            let mut open: Vec<(usize, u8)> = Vec::new();
            for (at, b) in brackets(&text[range.span()]) {
                let at = range.start + at;
                match b {
                    b'(' | b'[' | b'{' => open.push((at, b)),
                    close => match open.pop() {
                        Some((_, o)) if o == opener(close) => {}
                        Some((_, o)) => {
                            let expected = match o {
                                b'(' => ')',
                                b'[' => ']',
                                _ => '}',
                            };
                            diagnostics.push(diagnostic(
                                at,
                                format!("Expected `{expected}` but found `{}`", close as char),
                            ));
                        }
                        None => diagnostics
                            .push(diagnostic(at, format!("Unmatched `{}`", close as char))),
                    },
                }
            }
            for (at, b) in open {
                diagnostics.push(diagnostic(at, format!("Unclosed `{}`", b as char)));
            }
        }
        Ok(diagnostics)
    }

    /// Shows the line declaring the identifier under the cursor.
    fn hover(&self, doc: &DocumentSnapshot, offset: usize) -> Result<Option<Hover>> {
        let Some((name, outline)) = self.identifier_at(doc, offset)? else {
            return Ok(None);
        };
        let Some(decl) = outline.declarations.iter().find(|d| d.name == name) else {
            return Ok(None);
        };

        let text = doc.text();
        let line_start = text[..decl.span.start].rfind('\n').map_or(0, |p| p + 1);
        let line_end = text[decl.span.end..]
            .find('\n')
            .map_or(text.len(), |p| decl.span.end + p);
        let lang = self.segmenter.segment(doc)?.dialect_at(decl.span.start);
        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format!("```{lang}\n{}\n```", text[line_start..line_end].trim()),
            }),
            range: None,
        }))
    }

    /// Signature of a locally declared function whose argument list
    /// encloses the cursor.
    fn signature_help(
        &self,
        doc: &DocumentSnapshot,
        offset: usize,
    ) -> Result<Option<SignatureHelp>> {
        let model = self.segmenter.segment(doc)?;
        let Some(range) = model.range_at(offset).filter(|r| r.dialect.is_script()) else {
            return Ok(None);
        };
        let text = doc.text();
        let Some((open, active)) = enclosing_call(&text[range.start..offset.min(range.end)]) else {
            return Ok(None);
        };
        let open = range.start + open;
        let Some(callee) = word_at(text, open, is_ident_byte).filter(|s| s.end == open) else {
            return Ok(None);
        };

        let name = &text[callee];
        let outline = self.outlines.get(doc)?;
        let Some(decl) = outline
            .declarations
            .iter()
            .find(|d| d.kind == SymbolKind::FUNCTION && d.name == name)
        else {
            return Ok(None);
        };
        let Some(params) = parameter_list(&text[decl.span.end..]) else {
            return Ok(None);
        };

        let parameters = params
            .iter()
            .map(|p| ParameterInformation {
                label: ParameterLabel::Simple(p.clone()),
                documentation: None,
            })
            .collect();
        Ok(Some(SignatureHelp {
            signatures: vec![SignatureInformation {
                label: format!("{name}({})", params.join(", ")),
                documentation: None,
                parameters: Some(parameters),
                active_parameter: None,
            }],
            active_signature: Some(0),
            active_parameter: Some(active as u32),
        }))
    }

    fn document_highlights(
        &self,
        doc: &DocumentSnapshot,
        offset: usize,
    ) -> Result<Vec<DocumentHighlight>> {
        let Some((name, outline)) = self.identifier_at(doc, offset)? else {
            return Ok(Vec::new());
        };
        let line_index = doc.line_index();
        Ok(Self::occurrences(doc, &outline, &name)
            .map(|span| DocumentHighlight {
                range: line_index.span_to_range(span),
                kind: Some(
                    if outline.declarations.iter().any(|d| &d.span == span) {
                        DocumentHighlightKind::WRITE
                    } else {
                        DocumentHighlightKind::READ
                    },
                ),
            })
            .collect())
    }

    fn document_symbols(&self, doc: &DocumentSnapshot) -> Result<Vec<SymbolInformation>> {
        let outline = self.outlines.get(doc)?;
        let line_index = doc.line_index();
        #[allow(deprecated)]
        let symbols = outline
            .declarations
            .iter()
            .map(|d| SymbolInformation {
                name: d.name.clone(),
                kind: d.kind,
                tags: None,
                deprecated: None,
                location: Location::new(doc.uri.clone(), line_index.span_to_range(&d.span)),
                container_name: None,
            })
            .collect();
        Ok(symbols)
    }

    /// Links relative and aliased import specifiers. Bare package imports
    /// are left alone.
    fn document_links(
        &self,
        doc: &DocumentSnapshot,
        context: &ResolveContext,
    ) -> Result<Vec<DocumentLink>> {
        let outline = self.outlines.get(doc)?;
        let line_index = doc.line_index();
        Ok(outline
            .imports
            .iter()
            .filter_map(|span| {
                let specifier = &doc.text()[span.clone()];
                let target = if specifier.starts_with("./") || specifier.starts_with("../") {
                    context.resolve(specifier)
                } else {
                    let path = self.project.resolve_alias(specifier)?;
                    context.resolve_in_workspace(&path)
                }?;
                Some(DocumentLink {
                    range: line_index.span_to_range(span),
                    target: Some(target),
                    tooltip: None,
                    data: None,
                })
            })
            .collect())
    }

    /// Local declarations first; otherwise declarations of other indexed
    /// documents with the same name.
    fn definition(&self, doc: &DocumentSnapshot, offset: usize) -> Result<Vec<Location>> {
        let Some((name, outline)) = self.identifier_at(doc, offset)? else {
            return Ok(Vec::new());
        };
        let line_index = doc.line_index();
        let local: Vec<Location> = outline
            .declarations
            .iter()
            .filter(|d| d.name == name)
            .map(|d| Location::new(doc.uri.clone(), line_index.span_to_range(&d.span)))
            .collect();
        if !local.is_empty() {
            return Ok(local);
        }

        let mut remote: Vec<Location> = self
            .file_info
            .iter()
            .filter(|entry| entry.key() != &doc.uri)
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|(n, _)| *n == name)
                    .map(|(_, range)| Location::new(entry.key().clone(), *range))
                    .collect::<Vec<_>>()
            })
            .collect();
        remote.sort_by(|a, b| a.uri.as_str().cmp(b.uri.as_str()));
        Ok(remote)
    }

    fn references(&self, doc: &DocumentSnapshot, offset: usize) -> Result<Vec<Location>> {
        let Some((name, outline)) = self.identifier_at(doc, offset)? else {
            return Ok(Vec::new());
        };
        let line_index = doc.line_index();
        Ok(Self::occurrences(doc, &outline, &name)
            .map(|span| Location::new(doc.uri.clone(), line_index.span_to_range(span)))
            .collect())
    }

    fn on_document_changed(&self, uri: &Url) {
        self.file_info.remove(uri);
        self.outlines.on_document_removed(uri);
    }

    fn on_document_removed(&self, doc: &DocumentSnapshot) {
        self.file_info.remove(&doc.uri);
        self.outlines.on_document_removed(&doc.uri);
    }

    fn dispose(&self) {
        self.outlines.dispose();
        self.file_info.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Position;

    fn mode() -> ScriptMode {
        ScriptMode::new(
            Arc::new(DocumentSegmenter::default()),
            ProjectConfig::default(),
            CacheConfig::default(),
        )
    }

    fn doc(name: &str, text: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(Url::parse(&format!("file:///app/src/{name}")).unwrap(), 1, text)
    }

    #[test]
    fn outlines_declarations() {
        let text = "<script lang=\"ts\">\nexport const count = 1\nfunction inc() {}\ninterface Props {}\n</script>";
        let names: Vec<_> = mode()
            .document_symbols(&doc("A.vue", text))
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("count".to_string(), SymbolKind::CONSTANT),
                ("inc".to_string(), SymbolKind::FUNCTION),
                ("Props".to_string(), SymbolKind::INTERFACE),
            ]
        );
    }

    #[test]
    fn template_declarations_are_ignored() {
        // The template text is blanked before scanning.
        let text = "<template><p>const hidden = 1</p></template><script>let shown</script>";
        let names: Vec<_> = mode()
            .document_symbols(&doc("A.vue", text))
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["shown"]);
    }

    #[test]
    fn references_span_script_and_template_expressions() {
        let text = "<template><p>{{ label }}</p></template>\n<script>\nconst label = 'x'\nconsole.log(label)\n</script>";
        let d = doc("A.vue", text);
        let offset = text.find("label = ").unwrap() + 1;
        let refs = mode().references(&d, offset).unwrap();
        let starts: Vec<_> = refs.iter().map(|l| l.range.start).collect();
        assert_eq!(
            starts,
            vec![Position::new(0, 16), Position::new(2, 6), Position::new(3, 12)]
        );
    }

    #[test]
    fn definition_prefers_local_then_other_files() {
        let m = mode();
        let store = doc("store.vue", "<script>\nexport function useStore() {}\n</script>");
        m.update_file_info(&store);

        let text = "<script>\nuseStore()\n</script>";
        let app = doc("App.vue", text);
        let defs = m.definition(&app, text.find("useStore").unwrap()).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].uri, store.uri);
        assert_eq!(defs[0].range.start, Position::new(1, 16));

        m.on_document_removed(&store);
        assert!(m.definition(&app, text.find("useStore").unwrap()).unwrap().is_empty());
    }

    #[test]
    fn hover_shows_declaration_line() {
        let text = "<script lang=\"ts\">\nconst count = 1\ncount\n</script>";
        let hover = mode()
            .hover(&doc("A.vue", text), text.rfind("count").unwrap())
            .unwrap();
        let Some(Hover {
            contents: HoverContents::Markup(markup),
            ..
        }) = hover
        else {
            panic!("expected markdown hover");
        };
        assert_eq!(markup.value, "```typescript\nconst count = 1\n```");
    }

    #[test]
    fn signature_help_tracks_active_parameter() {
        let text = "<script>\nfunction add(a, b = f(1, 2)) {}\nadd(x, [1, 2], \n</script>";
        let offset = text.find("[1, 2], ").unwrap() + 8;
        let help = mode()
            .signature_help(&doc("A.vue", text), offset)
            .unwrap()
            .unwrap();
        assert_eq!(help.signatures[0].label, "add(a, b = f(1, 2))");
        assert_eq!(help.active_parameter, Some(2));
    }

    #[test]
    fn no_signature_help_outside_calls() {
        let text = "<script>\nfunction add(a) {}\nconst x = 1\n</script>";
        let offset = text.find("= 1").unwrap();
        assert!(mode()
            .signature_help(&doc("A.vue", text), offset)
            .unwrap()
            .is_none());
    }

    #[test]
    fn validates_brackets_per_region() {
        let text = "<script>\nfoo(bar]\nconst s = ')'\n</script><template><a :x=\"f(\"></a></template>";
        let messages: Vec<_> = mode()
            .validate(&doc("A.vue", text))
            .unwrap()
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(
            messages,
            vec!["Expected `)` but found `]`", "Unclosed `(`"]
        );
    }

    #[test]
    fn links_relative_and_aliased_imports() {
        let mut m = mode();
        m.project = ProjectConfig::parse(
            Path::new("/app"),
            PathBuf::from("/app/tsconfig.json"),
            r#"{ "compilerOptions": { "paths": { "@/*": ["src/*"] } } }"#,
        );
        let text = "<script>\nimport a from './a.vue'\nimport b from '@/b'\nimport c from 'vue'\n</script>";
        let d = doc("components/X.vue", text);
        let ctx = ResolveContext::new(d.uri.clone(), Some(PathBuf::from("/app")));
        let targets: Vec<_> = m
            .document_links(&d, &ctx)
            .unwrap()
            .into_iter()
            .filter_map(|l| l.target.map(|t| t.to_string()))
            .collect();
        assert_eq!(
            targets,
            vec![
                "file:///app/src/components/a.vue".to_string(),
                "file:///app/src/b".to_string(),
            ]
        );
    }

    #[test]
    fn aliases_prefer_longest_prefix() {
        let config = ProjectConfig::parse(
            Path::new("/app"),
            PathBuf::from("/app/jsconfig.json"),
            r#"{ "compilerOptions": { "baseUrl": "./", "paths": { "@/*": ["src/*"], "@/ui/*": ["lib/ui/*"] } } }"#,
        );
        assert_eq!(config.resolve_alias("@/ui/Button"), Some("lib/ui/Button".to_string()));
        assert_eq!(config.resolve_alias("@/main"), Some("src/main".to_string()));
        assert_eq!(config.resolve_alias("lodash"), None);
    }

    #[test]
    fn unparsable_project_file_falls_back_to_defaults() {
        let config = ProjectConfig::parse(
            Path::new("/app"),
            PathBuf::from("/app/tsconfig.json"),
            "{ // comments are not JSON\n }",
        );
        assert!(config.aliases.is_empty());
        assert_eq!(config.config_file, Some(PathBuf::from("/app/tsconfig.json")));
    }

    #[tokio::test]
    async fn load_without_project_file_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("sfc-lsp-script-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let config = ProjectConfig::load(Some(&dir)).await.unwrap();
        assert_eq!(config.root.as_deref(), Some(dir.as_path()));
        assert!(config.config_file.is_none());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
