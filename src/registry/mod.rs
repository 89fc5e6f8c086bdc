//! Dialect to mode dispatch.
//!
//! A [`ModeRegistry`] is produced by [`ModeRegistryBuilder::build`] once
//! every mode, including asynchronously constructed ones, is available. It
//! is immutable afterwards apart from the one-way shutdown transition.
//!
//! Several dialects may share one mode instance. Dispatch goes through the
//! dialect map; lifecycle fan-out goes through the list of distinct
//! instances, so a shared mode is notified and disposed once.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tower_lsp::lsp_types::Url;
use tracing::{debug, info, warn};

use crate::document::{DialectId, DocumentSegmenter, DocumentSnapshot, LanguageRange};
use crate::error::Result;
use crate::modes::{Capabilities, Mode};
use crate::settings::Settings;

mod lifecycle;

pub use lifecycle::{RegistryPhase, RegistrySlot};

type ModeFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn Mode>>> + Send>>;

enum PendingMode {
    Ready(Arc<dyn Mode>),
    Deferred(ModeFuture),
}

fn same_instance(a: &Arc<dyn Mode>, b: &Arc<dyn Mode>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn push_distinct(distinct: &mut Vec<Arc<dyn Mode>>, mode: &Arc<dyn Mode>) {
    if !distinct.iter().any(|m| same_instance(m, mode)) {
        distinct.push(Arc::clone(mode));
    }
}

/// Collects mode factories and resolves them into a [`ModeRegistry`].
pub struct ModeRegistryBuilder {
    segmenter: Arc<DocumentSegmenter>,
    pending: Vec<(Vec<DialectId>, PendingMode)>,
}

impl ModeRegistryBuilder {
    pub fn new(segmenter: Arc<DocumentSegmenter>) -> Self {
        Self {
            segmenter,
            pending: Vec::new(),
        }
    }

    /// Register an already constructed mode for `dialects`.
    pub fn register(mut self, dialects: &[DialectId], mode: Arc<dyn Mode>) -> Self {
        self.pending.push((dialects.to_vec(), PendingMode::Ready(mode)));
        self
    }

    /// Register a mode whose construction completes asynchronously.
    pub fn register_async<F>(mut self, dialects: &[DialectId], factory: F) -> Self
    where
        F: Future<Output = Result<Arc<dyn Mode>>> + Send + 'static,
    {
        self.pending
            .push((dialects.to_vec(), PendingMode::Deferred(Box::pin(factory))));
        self
    }

    /// Await every deferred mode in registration order.
    ///
    /// If any factory fails, the modes constructed so far are disposed and
    /// the error is returned.
    pub async fn build(self) -> Result<ModeRegistry> {
        let mut modes: HashMap<DialectId, Arc<dyn Mode>> = HashMap::new();
        let mut distinct: Vec<Arc<dyn Mode>> = Vec::new();

        let mut pending = self.pending.into_iter();
        while let Some((dialects, mode)) = pending.next() {
            let mode = match mode {
                PendingMode::Ready(mode) => mode,
                PendingMode::Deferred(factory) => match factory.await {
                    Ok(mode) => mode,
                    Err(e) => {
                        warn!(?dialects, error = %e, "mode construction failed");
                        for (_, rest) in pending {
                            if let PendingMode::Ready(mode) = rest {
                                push_distinct(&mut distinct, &mode);
                            }
                        }
                        for mode in &distinct {
                            mode.dispose();
                        }
                        self.segmenter.dispose();
                        return Err(e);
                    }
                },
            };

            push_distinct(&mut distinct, &mode);
            for dialect in dialects {
                if modes.insert(dialect, Arc::clone(&mode)).is_some() {
                    debug!(%dialect, "mode registration replaced");
                }
            }
        }

        info!(dialects = modes.len(), modes = distinct.len(), "mode registry ready");
        Ok(ModeRegistry {
            segmenter: self.segmenter,
            modes,
            distinct,
            disposed: AtomicBool::new(false),
        })
    }
}

pub struct ModeRegistry {
    segmenter: Arc<DocumentSegmenter>,
    modes: HashMap<DialectId, Arc<dyn Mode>>,
    distinct: Vec<Arc<dyn Mode>>,
    disposed: AtomicBool,
}

impl ModeRegistry {
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn segmenter(&self) -> &Arc<DocumentSegmenter> {
        &self.segmenter
    }

    /// The mode registered for `dialect`, if any.
    pub fn lookup(&self, dialect: DialectId) -> Option<Arc<dyn Mode>> {
        if self.is_disposed() {
            return None;
        }
        self.modes.get(&dialect).cloned()
    }

    /// Registered dialects, sorted.
    pub fn dialects(&self) -> Vec<DialectId> {
        let mut dialects: Vec<_> = self.modes.keys().copied().collect();
        dialects.sort();
        dialects
    }

    /// The mode governing `offset` in `doc`.
    pub fn mode_at(
        &self,
        doc: &DocumentSnapshot,
        offset: usize,
    ) -> Result<Option<Arc<dyn Mode>>> {
        if self.is_disposed() {
            return Ok(None);
        }
        let model = self.segmenter.segment(doc)?;
        Ok(self.lookup(model.dialect_at(offset)))
    }

    /// Every region of `doc` whose dialect has a mode, in document order.
    pub fn all_regions_with_modes(
        &self,
        doc: &DocumentSnapshot,
    ) -> Result<Vec<(LanguageRange, Arc<dyn Mode>)>> {
        if self.is_disposed() {
            return Ok(Vec::new());
        }
        let model = self.segmenter.segment(doc)?;
        Ok(model
            .all_ranges()
            .iter()
            .filter_map(|range| Some((*range, self.lookup(range.dialect)?)))
            .collect())
    }

    /// Distinct modes with at least one region in `doc`, in order of first
    /// appearance.
    pub fn modes_in_document(&self, doc: &DocumentSnapshot) -> Result<Vec<Arc<dyn Mode>>> {
        let mut modes = Vec::new();
        for (_, mode) in self.all_regions_with_modes(doc)? {
            push_distinct(&mut modes, &mode);
        }
        Ok(modes)
    }

    /// Distinct mode instances.
    pub fn all_modes(&self) -> Vec<Arc<dyn Mode>> {
        if self.is_disposed() {
            return Vec::new();
        }
        self.distinct.clone()
    }

    fn each_supporting(
        &self,
        capability: Capabilities,
    ) -> impl Iterator<Item = &Arc<dyn Mode>> {
        let live = !self.is_disposed();
        self.distinct
            .iter()
            .filter(move |m| live && m.supports(capability))
    }

    pub fn configure(&self, settings: &Settings) {
        for mode in self.each_supporting(Capabilities::CONFIGURE) {
            mode.configure(settings);
        }
    }

    pub fn update_file_info(&self, doc: &DocumentSnapshot) {
        for mode in self.each_supporting(Capabilities::UPDATE_FILE_INFO) {
            mode.update_file_info(doc);
        }
    }

    /// A file changed outside the editor.
    pub fn document_changed(&self, uri: &Url) {
        for mode in self.each_supporting(Capabilities::DOCUMENT_CHANGED) {
            mode.on_document_changed(uri);
        }
    }

    /// Drop everything held for `doc`. Safe to call repeatedly.
    pub fn document_closed(&self, doc: &DocumentSnapshot) {
        if self.is_disposed() {
            return;
        }
        self.segmenter.on_document_removed(&doc.uri);
        for mode in &self.distinct {
            mode.on_document_removed(doc);
        }
    }

    /// Dispose the segmentation cache and every distinct mode. Only the
    /// first call has any effect.
    pub fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.segmenter.dispose();
        for mode in &self.distinct {
            mode.dispose();
        }
        info!(modes = self.distinct.len(), "mode registry disposed");
    }
}
