//! Document snapshots, language regions and segmentation.
//!
//! This module provides:
//! - `DocumentSnapshot` and `DocumentStore` for document lifecycle management
//! - `LineIndex` for byte offset <-> LSP position conversion
//! - `LanguageRange` and `DocumentRegionModel` describing embedded dialects
//! - `DocumentSegmenter`, the memoized region scanner

mod region;
mod segmenter;
mod snapshot;
mod text;

pub use region::{DialectId, DocumentRegionModel, LanguageRange};
pub use segmenter::{scan_regions, DocumentSegmenter};
pub use snapshot::{DocumentSnapshot, DocumentStore};
pub use text::LineIndex;
