//! Memoization of per-document derived models keyed by URI and version.
//!
//! Each URI holds at most one entry. A request for a version other than the
//! cached one recomputes and replaces it, so a stale model is never served.
//! Entries are bounded by an LRU capacity and by an idle TTL enforced by a
//! periodic sweep.

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Url;
use tracing::{debug, trace};

use crate::document::DocumentSnapshot;
use crate::error::Result;

/// Capacity and expiry policy for a [`VersionedModelCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of documents held at once.
    pub capacity: NonZeroUsize,
    /// Entries untouched for longer than this are swept.
    pub ttl: Duration,
    /// How often the background sweep runs.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN),
            ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

type ComputeFn<T> = Box<dyn Fn(&DocumentSnapshot) -> Result<T> + Send + Sync>;

#[derive(Debug)]
struct CacheEntry<T> {
    version: i32,
    value: Arc<T>,
    last_access: Instant,
}

struct CacheState<T> {
    entries: LruCache<Url, CacheEntry<T>>,
    sweeper: Option<JoinHandle<()>>,
    disposed: bool,
}

pub struct VersionedModelCache<T> {
    name: &'static str,
    config: CacheConfig,
    compute: ComputeFn<T>,
    state: Mutex<CacheState<T>>,
}

impl<T> VersionedModelCache<T> {
    /// Create a cache whose models are produced by `compute`.
    ///
    /// `name` only labels log output.
    pub fn new(
        name: &'static str,
        config: CacheConfig,
        compute: impl Fn(&DocumentSnapshot) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            config,
            compute: Box::new(compute),
            state: Mutex::new(CacheState {
                entries: LruCache::new(config.capacity),
                sweeper: None,
                disposed: false,
            }),
        }
    }

    /// Return the model for `snapshot`, computing it if the cached entry is
    /// missing or belongs to a different version.
    ///
    /// A failed computation is returned to the caller and nothing is stored.
    pub fn get(&self, snapshot: &DocumentSnapshot) -> Result<Arc<T>> {
        let mut state = self.state.lock();
        let now = Instant::now();

        if state.disposed {
            return (self.compute)(snapshot).map(Arc::new);
        }

        if let Some(entry) = state.entries.get_mut(&snapshot.uri) {
            if entry.version == snapshot.version {
                entry.last_access = now;
                trace!(
                    cache = self.name,
                    uri = %snapshot.uri,
                    version = snapshot.version,
                    "cache hit"
                );
                return Ok(Arc::clone(&entry.value));
            }
        }

        // Drop whatever is there first so a failed compute cannot leave the
        // previous version behind.
        if let Some(stale) = state.entries.pop(&snapshot.uri) {
            debug!(
                cache = self.name,
                uri = %snapshot.uri,
                stale = stale.version,
                version = snapshot.version,
                "replacing stale model"
            );
        }

        let value = Arc::new((self.compute)(snapshot)?);
        let entry = CacheEntry {
            version: snapshot.version,
            value: Arc::clone(&value),
            last_access: now,
        };
        if let Some((evicted, _)) = state.entries.push(snapshot.uri.clone(), entry) {
            if evicted != snapshot.uri {
                debug!(cache = self.name, uri = %evicted, "evicted least recently used model");
            }
        }
        Ok(value)
    }

    /// Evict the entry for `uri`, if any.
    pub fn on_document_removed(&self, uri: &Url) {
        if self.state.lock().entries.pop(uri).is_some() {
            debug!(cache = self.name, uri = %uri, "removed model");
        }
    }

    /// Evict every entry idle for longer than the TTL as of `now`.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        let expired: Vec<Url> = state
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_access) > self.config.ttl)
            .map(|(uri, _)| uri.clone())
            .collect();
        for uri in &expired {
            state.entries.pop(uri);
        }
        if !expired.is_empty() {
            debug!(cache = self.name, count = expired.len(), "swept idle models");
        }
        expired.len()
    }

    /// Drop every entry and stop the periodic sweep. Later `get` calls still
    /// compute but no longer store anything.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.disposed = true;
        if let Some(sweeper) = state.sweeper.take() {
            sweeper.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version currently cached for `uri`, without touching recency.
    pub fn cached_version(&self, uri: &Url) -> Option<i32> {
        self.state.lock().entries.peek(uri).map(|e| e.version)
    }
}

impl<T: Send + Sync + 'static> VersionedModelCache<T> {
    /// Start the periodic idle sweep on the current tokio runtime.
    ///
    /// Does nothing outside a runtime or with a zero interval. The task only
    /// holds a weak reference and ends once the cache is dropped or disposed.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let interval = self.config.sweep_interval;
        if interval.is_zero() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        let cache: Weak<Self> = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.evict_idle(Instant::now());
            }
        });
        if let Some(previous) = state.sweeper.replace(handle) {
            previous.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot(name: &str, version: i32, text: &str) -> DocumentSnapshot {
        let uri = Url::parse(&format!("file:///src/{name}.vue")).unwrap();
        DocumentSnapshot::new(uri, version, text)
    }

    fn config(capacity: usize) -> CacheConfig {
        CacheConfig {
            capacity: NonZeroUsize::new(capacity).unwrap(),
            ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }

    /// A cache computing the text length, counting invocations.
    fn counting_cache(config: CacheConfig) -> (VersionedModelCache<usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = VersionedModelCache::new("test", config, move |doc: &DocumentSnapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
            if doc.text().contains("boom") {
                return Err(Error::Compute {
                    uri: doc.uri.clone(),
                    message: "boom".into(),
                });
            }
            Ok(doc.text().len())
        });
        (cache, calls)
    }

    #[test]
    fn same_version_is_computed_once() {
        let (cache, calls) = counting_cache(config(4));
        let doc = snapshot("a", 1, "abc");
        assert_eq!(*cache.get(&doc).unwrap(), 3);
        assert_eq!(*cache.get(&doc).unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn newer_version_replaces_entry() {
        let (cache, calls) = counting_cache(config(4));
        cache.get(&snapshot("a", 1, "abc")).unwrap();
        let value = cache.get(&snapshot("a", 2, "abcdef")).unwrap();

        assert_eq!(*value, 6);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cached_version(&snapshot("a", 0, "").uri), Some(2));
    }

    #[test]
    fn removal_is_idempotent() {
        let (cache, calls) = counting_cache(config(4));
        let doc = snapshot("a", 1, "abc");
        cache.get(&doc).unwrap();
        cache.on_document_removed(&doc.uri);
        cache.on_document_removed(&doc.uri);
        assert!(cache.is_empty());

        cache.get(&doc).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let (cache, calls) = counting_cache(config(2));
        let a = snapshot("a", 1, "a");
        let b = snapshot("b", 1, "b");
        let c = snapshot("c", 1, "c");

        cache.get(&a).unwrap();
        cache.get(&b).unwrap();
        cache.get(&a).unwrap();
        cache.get(&c).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.cached_version(&b.uri), None);

        cache.get(&a).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        cache.get(&b).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn idle_entries_are_swept() {
        let (cache, _) = counting_cache(config(4));
        cache.get(&snapshot("a", 1, "a")).unwrap();
        cache.get(&snapshot("b", 1, "b")).unwrap();

        assert_eq!(cache.evict_idle(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(cache.evict_idle(later), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_compute_is_not_cached() {
        let (cache, calls) = counting_cache(config(4));
        cache.get(&snapshot("a", 1, "fine")).unwrap();

        assert!(cache.get(&snapshot("a", 2, "boom")).is_err());
        assert!(cache.is_empty());
        assert!(cache.get(&snapshot("a", 2, "boom")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dispose_clears_and_stops_storing() {
        let (cache, calls) = counting_cache(config(4));
        let doc = snapshot("a", 1, "abc");
        cache.get(&doc).unwrap();
        cache.dispose();
        assert!(cache.is_empty());

        assert_eq!(*cache.get(&doc).unwrap(), 3);
        assert!(cache.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn background_sweeper_evicts_idle_entries() {
        let (cache, _) = counting_cache(CacheConfig {
            capacity: NonZeroUsize::new(4).unwrap(),
            ttl: Duration::ZERO,
            sweep_interval: Duration::from_millis(10),
        });
        let cache = Arc::new(cache);
        cache.get(&snapshot("a", 1, "a")).unwrap();
        cache.spawn_sweeper();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());
        cache.dispose();
    }
}
