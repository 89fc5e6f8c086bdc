//! Settings loaded from `sfc-lsp.toml` and from client configuration.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::CacheConfig;
use crate::document::DialectId;
use crate::error::{Error, Result};

pub const SETTINGS_FILE: &str = "sfc-lsp.toml";

/// Root settings structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub dialects: DialectSettings,
    pub template: ValidationSettings,
    pub style: ValidationSettings,
    pub script: ValidationSettings,
}

/// Bounds shared by every per-document model cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of documents per cache (default: 10).
    pub capacity: usize,
    /// Seconds an entry may go unread before it is swept (default: 60).
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let config = CacheConfig::default();
        Self {
            capacity: config.capacity.get(),
            ttl_secs: config.ttl.as_secs(),
            sweep_interval_secs: config.sweep_interval.as_secs(),
        }
    }
}

impl CacheSettings {
    /// Zero values are clamped to one.
    pub fn to_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN),
            ttl: Duration::from_secs(self.ttl_secs.max(1)),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectSettings {
    /// Language ids whose modes are not registered, e.g. `["stylus"]`.
    pub disabled: Vec<String>,
}

impl DialectSettings {
    pub fn is_enabled(&self, dialect: DialectId) -> bool {
        !self
            .disabled
            .iter()
            .any(|d| d.eq_ignore_ascii_case(dialect.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub validate: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self { validate: true }
    }
}

impl Settings {
    /// Layer a `workspace/didChangeConfiguration` payload over `self`.
    ///
    /// Only the `sfc` section is read; keys it leaves out keep their current
    /// values. Returns `None` when the payload carries no `sfc` section.
    pub fn with_overrides(&self, payload: Value) -> Result<Option<Self>> {
        let Value::Object(mut map) = payload else {
            return Ok(None);
        };
        let section = match map.remove("sfc") {
            None | Some(Value::Null) => return Ok(None),
            Some(section) => section,
        };
        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, section);
        Ok(Some(serde_json::from_value(merged)?))
    }
}

fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Load settings from a settings file.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| Error::Settings {
        path: path.to_path_buf(),
        source,
    })
}

/// Discover `sfc-lsp.toml` by searching up the directory tree, then direct children.
///
/// Returns `(settings, settings_dir)`. Falls back to the defaults and
/// `start_dir` when nothing is found; an unreadable file is logged and
/// treated as absent.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let load = |candidate: &Path, dir: PathBuf| match load_settings(candidate) {
        Ok(settings) => {
            debug!(path = %candidate.display(), "loaded settings");
            (settings, dir)
        }
        Err(e) => {
            warn!(error = %e, "using default settings");
            (Settings::default(), dir)
        }
    };

    // Walk up from start_dir
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return load(&candidate, dir.to_path_buf());
        }
        current = dir.parent();
    }

    // Immediate child directories
    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    return load(&candidate, entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
