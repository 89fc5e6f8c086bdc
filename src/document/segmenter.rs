//! Splitting a single-file component into language regions.
//!
//! Top-level `<template>`, `<script>` and `<style>` blocks become block
//! regions; their `lang` attribute selects the dialect. Inside an HTML
//! template, directive attribute values (`v-if="..."`, `:prop`, `@event`,
//! `#slot`) and `{{ }}` interpolations become script regions flagged as
//! attribute values, and the template region is split around them so no
//! two regions overlap.

use std::ops::Range;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::Url;

use crate::cache::{CacheConfig, VersionedModelCache};
use crate::document::{DialectId, DocumentRegionModel, DocumentSnapshot, LanguageRange};
use crate::error::Result;

/// Opening tag of a top-level block, allowing `>` inside quoted attributes.
static BLOCK_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([A-Za-z][\w-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap()
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+)))?"#).unwrap()
});

/// Memoized segmentation shared by the registry and the modes.
pub struct DocumentSegmenter {
    cache: Arc<VersionedModelCache<DocumentRegionModel>>,
}

impl DocumentSegmenter {
    pub fn new(config: CacheConfig) -> Self {
        let cache = VersionedModelCache::new("regions", config, |doc: &DocumentSnapshot| {
            Ok(scan_regions(doc.text()))
        });
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Regions of `snapshot`, computed once per version.
    pub fn segment(&self, snapshot: &DocumentSnapshot) -> Result<Arc<DocumentRegionModel>> {
        self.cache.get(snapshot)
    }

    /// Start the idle sweep of the underlying cache.
    pub fn spawn_sweeper(&self) {
        self.cache.spawn_sweeper();
    }

    pub fn on_document_removed(&self, uri: &Url) {
        self.cache.on_document_removed(uri);
    }

    pub fn dispose(&self) {
        self.cache.dispose();
    }

    pub fn cache(&self) -> &VersionedModelCache<DocumentRegionModel> {
        &self.cache
    }
}

impl Default for DocumentSegmenter {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[derive(Debug)]
struct Block {
    dialect: DialectId,
    content: Range<usize>,
}

/// Segment `text` into non-overlapping language ranges.
pub fn scan_regions(text: &str) -> DocumentRegionModel {
    let blocks = scan_blocks(text);

    let expression_dialect = blocks
        .iter()
        .map(|b| b.dialect)
        .find(|d| d.is_script())
        .unwrap_or(DialectId::JavaScript);

    let mut ranges = Vec::new();
    for block in blocks {
        if block.dialect != DialectId::VueHtml {
            ranges.push(LanguageRange::new(
                block.dialect,
                block.content.start,
                block.content.end,
            ));
            continue;
        }

        let mut cursor = block.content.start;
        for expr in template_expressions(text, block.content.clone()) {
            ranges.push(LanguageRange::new(DialectId::VueHtml, cursor, expr.start));
            ranges.push(LanguageRange::attribute(
                expression_dialect,
                expr.start,
                expr.end,
            ));
            cursor = expr.end;
        }
        ranges.push(LanguageRange::new(
            DialectId::VueHtml,
            cursor,
            block.content.end,
        ));
    }

    DocumentRegionModel::new(ranges)
}

fn scan_blocks(text: &str) -> Vec<Block> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(lt) = find_bytes(bytes, pos, bytes.len(), b"<") {
        if bytes[lt..].starts_with(b"<!--") {
            pos = find_bytes(bytes, lt + 4, bytes.len(), b"-->").map_or(bytes.len(), |p| p + 3);
            continue;
        }

        let Some(open) = BLOCK_OPEN
            .captures_at(text, lt)
            .filter(|c| c.get(0).is_some_and(|m| m.start() == lt))
        else {
            pos = lt + 1;
            continue;
        };
        let whole = open.get(0).map_or(lt..lt + 1, |m| m.range());
        let name = open.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
        let attrs = open.get(2).map_or("", |m| m.as_str());

        if attrs.trim_end().ends_with('/') {
            pos = whole.end;
            continue;
        }

        let content_start = whole.end;
        let close = if name == "template" {
            find_template_close(text, content_start)
        } else {
            find_close_tag(text, content_start, &name)
        };
        let (content_end, next) = close.map_or((text.len(), text.len()), |c| (c.start, c.end));
        pos = next;

        let lang = attribute_value(attrs, "lang");
        let dialect = match name.as_str() {
            "template" => DialectId::template_lang(lang),
            "script" => DialectId::script_lang(lang),
            "style" => DialectId::style_lang(lang),
            // Custom blocks are skipped wholesale.
            _ => continue,
        };
        blocks.push(Block {
            dialect,
            content: content_start..content_end,
        });
    }

    blocks
}

/// Value of the attribute `name` in a raw attribute string.
fn attribute_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTRIBUTE.captures_iter(attrs).find_map(|caps| {
        let attr = caps.get(1)?;
        if !attr.as_str().eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
    })
}

/// Span of the `</name>` tag closing a block opened before `from`.
fn find_close_tag(text: &str, from: usize, name: &str) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    let needle = format!("</{name}");
    let mut pos = from;
    while let Some(start) = find_bytes_ignore_case(bytes, pos, needle.as_bytes()) {
        let mut end = start + needle.len();
        while end < bytes.len() && bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        if bytes.get(end) == Some(&b'>') {
            return Some(start..end + 1);
        }
        pos = start + 1;
    }
    None
}

/// Closing tag of a top-level template, skipping nested `<template>` pairs.
fn find_template_close(text: &str, from: usize) -> Option<Range<usize>> {
    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let close = find_close_tag(text, pos, "template")?;
        let mut scan = pos;
        while let Some(open) = BLOCK_OPEN.captures_at(text, scan) {
            let Some(m) = open.get(0) else { break };
            if m.start() >= close.start {
                break;
            }
            let is_template = open
                .get(1)
                .is_some_and(|n| n.as_str().eq_ignore_ascii_case("template"));
            let self_closing = open
                .get(2)
                .is_some_and(|a| a.as_str().trim_end().ends_with('/'));
            if is_template && !self_closing {
                depth += 1;
            }
            scan = m.end();
        }
        depth -= 1;
        if depth == 0 {
            return Some(close);
        }
        pos = close.end;
    }
}

/// Spans of script expressions embedded in an HTML template.
fn template_expressions(text: &str, span: Range<usize>) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let end = span.end;
    let mut out = Vec::new();
    let mut i = span.start;

    while i < end {
        let rest = &bytes[i..end];
        if rest.starts_with(b"<!--") {
            i = find_bytes(bytes, i + 4, end, b"-->").map_or(end, |p| p + 3);
        } else if rest.starts_with(b"{{") {
            let inner = i + 2;
            match find_bytes(bytes, inner, end, b"}}") {
                Some(close) => {
                    if close > inner {
                        out.push(inner..close);
                    }
                    i = close + 2;
                }
                None => i = end,
            }
        } else if rest.len() > 1 && rest[0] == b'<' && rest[1].is_ascii_alphabetic() {
            i = scan_tag(bytes, i + 1, end, &mut out);
        } else {
            i += 1;
        }
    }

    out
}

/// Walk the attributes of a start tag beginning at `i` (just past `<`),
/// recording directive values. Returns the offset after the tag.
fn scan_tag(bytes: &[u8], mut i: usize, end: usize, out: &mut Vec<Range<usize>>) -> usize {
    while i < end && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }

    while i < end {
        match bytes[i] {
            b'>' => return i + 1,
            b if b.is_ascii_whitespace() || b == b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < end
            && !matches!(bytes[i], b'=' | b'>' | b'/')
            && !bytes[i].is_ascii_whitespace()
        {
            i += 1;
        }
        let name = &bytes[name_start..i];
        if name.is_empty() {
            i += 1;
            continue;
        }

        let mut j = i;
        while j < end && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= end || bytes[j] != b'=' {
            continue;
        }
        j += 1;
        while j < end && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= end {
            return end;
        }

        let value = match bytes[j] {
            quote @ (b'"' | b'\'') => {
                let start = j + 1;
                let close = find_bytes(bytes, start, end, &[quote]).unwrap_or(end);
                i = (close + 1).min(end);
                start..close
            }
            _ => {
                let start = j;
                while j < end && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                    j += 1;
                }
                i = j;
                start..j
            }
        };

        if is_directive(name) && !value.is_empty() {
            out.push(value);
        }
    }

    end
}

fn is_directive(name: &[u8]) -> bool {
    name.starts_with(b"v-") || matches!(name.first(), Some(b':' | b'@' | b'#'))
}

fn find_bytes(bytes: &[u8], from: usize, end: usize, needle: &[u8]) -> Option<usize> {
    if from >= end || end - from < needle.len() {
        return None;
    }
    bytes[from..end]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn find_bytes_ignore_case(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() || bytes.len() - from < needle.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}
