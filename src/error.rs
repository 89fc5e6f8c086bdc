//! Error types shared by the cache, registry and server layers.

use std::path::PathBuf;

use thiserror::Error;
use tower_lsp::lsp_types::Url;

use crate::document::DialectId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A request arrived before the mode registry finished initializing.
    #[error("language modes are not ready yet")]
    NotReady,

    /// The registry has been shut down.
    #[error("language modes have been disposed")]
    Disposed,

    #[error("failed to parse settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration payload: {0}")]
    InvalidConfiguration(#[from] serde_json::Error),

    /// An asynchronously constructed mode failed to come up.
    #[error("failed to initialize {dialect} mode: {message}")]
    ModeInit { dialect: DialectId, message: String },

    /// Computing a derived per-document model failed.
    #[error("failed to compute model for {uri}: {message}")]
    Compute { uri: Url, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
