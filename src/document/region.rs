//! Language regions of a single-file component document.
//!
//! A document is split into non-overlapping [`LanguageRange`]s, each tagged
//! with the [`DialectId`] that governs it. Offsets not covered by any range
//! belong to the root markup dialect.

use std::fmt;

/// Identifier of an embedded sub-language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DialectId {
    VueHtml,
    Pug,
    Css,
    Scss,
    Less,
    Sass,
    Stylus,
    Postcss,
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    /// A block whose `lang` attribute names nothing we recognise.
    Unknown,
}

impl DialectId {
    pub const ALL: [DialectId; 13] = [
        DialectId::VueHtml,
        DialectId::Pug,
        DialectId::Css,
        DialectId::Scss,
        DialectId::Less,
        DialectId::Sass,
        DialectId::Stylus,
        DialectId::Postcss,
        DialectId::JavaScript,
        DialectId::TypeScript,
        DialectId::Jsx,
        DialectId::Tsx,
        DialectId::Unknown,
    ];

    pub const STYLES: [DialectId; 6] = [
        DialectId::Css,
        DialectId::Scss,
        DialectId::Less,
        DialectId::Sass,
        DialectId::Stylus,
        DialectId::Postcss,
    ];

    pub const SCRIPTS: [DialectId; 4] = [
        DialectId::JavaScript,
        DialectId::TypeScript,
        DialectId::Jsx,
        DialectId::Tsx,
    ];

    /// The LSP language id for this dialect.
    pub fn as_str(self) -> &'static str {
        match self {
            DialectId::VueHtml => "vue-html",
            DialectId::Pug => "pug",
            DialectId::Css => "css",
            DialectId::Scss => "scss",
            DialectId::Less => "less",
            DialectId::Sass => "sass",
            DialectId::Stylus => "stylus",
            DialectId::Postcss => "postcss",
            DialectId::JavaScript => "javascript",
            DialectId::TypeScript => "typescript",
            DialectId::Jsx => "javascriptreact",
            DialectId::Tsx => "typescriptreact",
            DialectId::Unknown => "unknown",
        }
    }

    /// Parse an LSP language id back into a dialect.
    pub fn from_language_id(id: &str) -> Option<DialectId> {
        DialectId::ALL
            .into_iter()
            .find(|d| *d != DialectId::Unknown && d.as_str() == id)
    }

    /// Dialect named by a `lang` attribute on a `<template>` block.
    pub fn template_lang(lang: Option<&str>) -> DialectId {
        match lang.map(str::to_ascii_lowercase).as_deref() {
            None | Some("html") => DialectId::VueHtml,
            Some("pug") | Some("jade") => DialectId::Pug,
            Some(_) => DialectId::Unknown,
        }
    }

    /// Dialect named by a `lang` attribute on a `<style>` block.
    pub fn style_lang(lang: Option<&str>) -> DialectId {
        match lang.map(str::to_ascii_lowercase).as_deref() {
            None | Some("css") => DialectId::Css,
            Some("scss") => DialectId::Scss,
            Some("less") => DialectId::Less,
            Some("sass") => DialectId::Sass,
            Some("stylus") | Some("styl") => DialectId::Stylus,
            Some("postcss") | Some("pcss") => DialectId::Postcss,
            Some(_) => DialectId::Unknown,
        }
    }

    /// Dialect named by a `lang` attribute on a `<script>` block.
    pub fn script_lang(lang: Option<&str>) -> DialectId {
        match lang.map(str::to_ascii_lowercase).as_deref() {
            None | Some("js") | Some("javascript") => DialectId::JavaScript,
            Some("ts") | Some("typescript") => DialectId::TypeScript,
            Some("jsx") => DialectId::Jsx,
            Some("tsx") => DialectId::Tsx,
            Some(_) => DialectId::Unknown,
        }
    }

    pub fn is_style(self) -> bool {
        DialectId::STYLES.contains(&self)
    }

    pub fn is_script(self) -> bool {
        DialectId::SCRIPTS.contains(&self)
    }
}

impl fmt::Display for DialectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous span `[start, end)` governed by one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageRange {
    pub dialect: DialectId,
    pub start: usize,
    pub end: usize,
    /// Set for expressions embedded in a markup attribute value or
    /// interpolation rather than a block.
    pub attribute_value: bool,
}

impl LanguageRange {
    pub fn new(dialect: DialectId, start: usize, end: usize) -> Self {
        Self {
            dialect,
            start,
            end,
            attribute_value: false,
        }
    }

    pub fn attribute(dialect: DialectId, start: usize, end: usize) -> Self {
        Self {
            dialect,
            start,
            end,
            attribute_value: true,
        }
    }

    /// Whether `offset` lies within the half-open `[start, end)`.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Segmentation of one document version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentRegionModel {
    ranges: Vec<LanguageRange>,
}

impl DocumentRegionModel {
    /// Build a model from ranges, sorting them by start offset.
    ///
    /// Ranges are expected not to overlap; empty ranges are dropped.
    pub fn new(mut ranges: Vec<LanguageRange>) -> Self {
        ranges.retain(|r| !r.is_empty());
        ranges.sort_by_key(|r| r.start);
        debug_assert!(
            ranges.windows(2).all(|w| w[0].end <= w[1].start),
            "language ranges overlap: {ranges:?}"
        );
        Self { ranges }
    }

    /// All ranges in document order.
    pub fn all_ranges(&self) -> &[LanguageRange] {
        &self.ranges
    }

    /// The range governing `offset`, if any.
    ///
    /// When one range ends exactly where the next starts, the later range
    /// wins.
    pub fn range_at(&self, offset: usize) -> Option<&LanguageRange> {
        // Index of the first range starting after `offset`.
        let idx = self.ranges.partition_point(|r| r.start <= offset);
        if idx == 0 {
            return None;
        }
        let candidate = &self.ranges[idx - 1];
        candidate.contains(offset).then_some(candidate)
    }

    /// The dialect governing `offset`, defaulting to the root markup dialect.
    pub fn dialect_at(&self, offset: usize) -> DialectId {
        self.range_at(offset)
            .map(|r| r.dialect)
            .unwrap_or(DialectId::VueHtml)
    }

    /// Ranges whose dialect matches `pred`.
    pub fn ranges_of<'a>(
        &'a self,
        pred: impl Fn(DialectId) -> bool + 'a,
    ) -> impl Iterator<Item = &'a LanguageRange> + 'a {
        self.ranges.iter().filter(move |r| pred(r.dialect))
    }

    /// Project `source` onto the ranges matching `pred`.
    ///
    /// Every byte outside those ranges becomes a space (newlines are kept),
    /// so offsets and line numbers in the result match the original text.
    pub fn embedded_text(&self, source: &str, pred: impl Fn(DialectId) -> bool) -> String {
        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        for range in self.ranges_of(pred) {
            let start = range.start.min(source.len());
            let end = range.end.min(source.len());
            blank_into(&mut out, &source[cursor..start]);
            out.push_str(&source[start..end]);
            cursor = end;
        }
        blank_into(&mut out, &source[cursor..]);
        out
    }
}

fn blank_into(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            out.push(c);
        } else {
            // Keep byte length identical for multi-byte characters.
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    }
}
