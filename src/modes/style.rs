//! Mode for stylesheet blocks. One instance serves one stylesheet dialect.

use std::ops::Range as Span;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, Diagnostic, DiagnosticSeverity,
    FormattingOptions, Location, Range, SymbolInformation, SymbolKind, TextEdit,
};

use super::{Capabilities, Mode};
use crate::document::{DialectId, DocumentSegmenter, DocumentSnapshot};
use crate::error::Result;
use crate::settings::Settings;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([0-9a-fA-F]{8}|[0-9a-fA-F]{6}|[0-9a-fA-F]{3,4})\b").unwrap());

pub struct StyleMode {
    dialect: DialectId,
    segmenter: Arc<DocumentSegmenter>,
    validate: AtomicBool,
}

impl StyleMode {
    pub fn new(dialect: DialectId, segmenter: Arc<DocumentSegmenter>) -> Self {
        Self {
            dialect,
            segmenter,
            validate: AtomicBool::new(true),
        }
    }

    /// Indentation-based dialects have no braces to check or outline.
    fn uses_braces(&self) -> bool {
        !matches!(self.dialect, DialectId::Sass | DialectId::Stylus)
    }

    /// Document text restricted to this mode's blocks.
    fn stylesheet(&self, doc: &DocumentSnapshot) -> Result<String> {
        let model = self.segmenter.segment(doc)?;
        Ok(model.embedded_text(doc.text(), |d| d == self.dialect))
    }

    fn diagnostic(&self, doc: &DocumentSnapshot, at: usize, message: &str) -> Diagnostic {
        Diagnostic {
            range: doc.line_index().span_to_range(&(at..at + 1)),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some(self.dialect.to_string()),
            message: message.to_string(),
            ..Default::default()
        }
    }
}

/// Brace events outside comments and strings: `(offset, is_open)`.
fn braces(css: &str) -> Vec<(usize, bool)> {
    let bytes = css.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != quote && bytes[j] != b'\n' {
                    j += if bytes[j] == b'\\' { 2 } else { 1 };
                }
                i = j + 1;
                continue;
            }
            b'{' => out.push((i, true)),
            b'}' => out.push((i, false)),
            _ => {}
        }
        i += 1;
    }
    out
}

/// Selector preceding each top-level rule: `(selector span)`.
fn top_level_selectors(css: &str) -> Vec<Span<usize>> {
    let mut depth = 0usize;
    let mut boundary = 0;
    let mut out = Vec::new();
    for (at, open) in braces(css) {
        if open {
            if depth == 0 {
                let prefix = &css[boundary..at];
                let rest = prefix.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
                let lead = prefix.len() - rest.len();
                let trail = prefix.trim_end().len();
                if trail > lead {
                    out.push(boundary + lead..boundary + trail);
                }
            }
            depth += 1;
        } else {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                boundary = at + 1;
            }
        }
    }
    out
}

fn parse_hex(hex: &str) -> Option<Color> {
    let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
    let short = |i: usize| {
        let c = &hex[i..i + 1];
        channel(&format!("{c}{c}"))
    };
    let (red, green, blue, alpha) = match hex.len() {
        3 => (short(0)?, short(1)?, short(2)?, 1.0),
        4 => (short(0)?, short(1)?, short(2)?, short(3)?),
        6 => (channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?, 1.0),
        8 => (
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            channel(&hex[6..8])?,
        ),
        _ => return None,
    };
    Some(Color {
        red,
        green,
        blue,
        alpha,
    })
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Mode for StyleMode {
    fn id(&self) -> DialectId {
        self.dialect
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CONFIGURE
            | Capabilities::VALIDATE
            | Capabilities::DOCUMENT_SYMBOLS
            | Capabilities::FORMAT
            | Capabilities::DOCUMENT_COLORS
            | Capabilities::COLOR_PRESENTATIONS
    }

    fn configure(&self, settings: &Settings) {
        self.validate.store(settings.style.validate, Ordering::Relaxed);
    }

    /// Reports unbalanced braces.
    fn validate(&self, doc: &DocumentSnapshot) -> Result<Vec<Diagnostic>> {
        if !self.validate.load(Ordering::Relaxed) || !self.uses_braces() {
            return Ok(Vec::new());
        }
        let css = self.stylesheet(doc)?;
        let model = self.segmenter.segment(doc)?;

        let mut diagnostics = Vec::new();
        // Each block is balanced on its own.
        for range in model.ranges_of(|d| d == self.dialect) {
            let mut open = Vec::new();
            for (at, is_open) in braces(&css[range.span()]) {
                let at = range.start + at;
                if is_open {
                    open.push(at);
                } else if open.pop().is_none() {
                    diagnostics.push(self.diagnostic(doc, at, "Unexpected `}`"));
                }
            }
            for at in open {
                diagnostics.push(self.diagnostic(doc, at, "Unclosed `{`"));
            }
        }
        Ok(diagnostics)
    }

    /// One class symbol per top-level rule, named by its selector.
    fn document_symbols(&self, doc: &DocumentSnapshot) -> Result<Vec<SymbolInformation>> {
        if !self.uses_braces() {
            return Ok(Vec::new());
        }
        let css = self.stylesheet(doc)?;
        let line_index = doc.line_index();
        #[allow(deprecated)]
        let symbols = top_level_selectors(&css)
            .into_iter()
            .map(|span| SymbolInformation {
                name: css[span.clone()].to_string(),
                kind: SymbolKind::CLASS,
                tags: None,
                deprecated: None,
                location: Location::new(doc.uri.clone(), line_index.span_to_range(&span)),
                container_name: None,
            })
            .collect();
        Ok(symbols)
    }

    /// Strips trailing whitespace from every line of the block.
    fn format(
        &self,
        doc: &DocumentSnapshot,
        span: Span<usize>,
        _options: &FormattingOptions,
    ) -> Result<Vec<TextEdit>> {
        let text = doc.text();
        let line_index = doc.line_index();
        let block = &text[span.clone()];

        let mut edits = Vec::new();
        let mut line_start = span.start;
        for line in block.split('\n') {
            let content = line.strip_suffix('\r').unwrap_or(line);
            let trimmed = content.trim_end_matches([' ', '\t']);
            if trimmed.len() < content.len() {
                let from = line_start + trimmed.len();
                let to = line_start + content.len();
                edits.push(TextEdit::new(line_index.span_to_range(&(from..to)), String::new()));
            }
            line_start += line.len() + 1;
        }
        Ok(edits)
    }

    fn document_colors(&self, doc: &DocumentSnapshot) -> Result<Vec<ColorInformation>> {
        let css = self.stylesheet(doc)?;
        let line_index = doc.line_index();
        Ok(HEX_COLOR
            .captures_iter(&css)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let color = parse_hex(caps.get(1)?.as_str())?;
                Some(ColorInformation {
                    range: line_index.span_to_range(&whole.range()),
                    color,
                })
            })
            .collect())
    }

    fn color_presentations(
        &self,
        _doc: &DocumentSnapshot,
        color: Color,
        range: Range,
    ) -> Result<Vec<ColorPresentation>> {
        let (r, g, b) = (to_byte(color.red), to_byte(color.green), to_byte(color.blue));
        let opaque = color.alpha >= 1.0;

        let hex = if opaque {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{:02x}", to_byte(color.alpha))
        };
        let rgb = if opaque {
            format!("rgb({r}, {g}, {b})")
        } else {
            format!("rgba({r}, {g}, {b}, {})", (color.alpha * 100.0).round() / 100.0)
        };

        Ok([rgb, hex]
            .into_iter()
            .map(|label| ColorPresentation {
                text_edit: Some(TextEdit::new(range, label.clone())),
                label,
                additional_text_edits: None,
            })
            .collect())
    }

    fn on_document_removed(&self, _doc: &DocumentSnapshot) {}

    fn dispose(&self) {}
}
