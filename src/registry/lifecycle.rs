//! Server-side holder for the registry while it is being built.
//!
//! Requests may arrive while the registry is still initializing. They get
//! [`Error::NotReady`] instead of racing a half-built registry.

use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tracing::{debug, info};

use super::ModeRegistry;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryPhase {
    Uninitialized,
    Initializing,
    Ready,
    /// Initialization failed; the slot stays empty.
    Failed,
    Disposed,
}

impl RegistryPhase {
    fn is_settled(self) -> bool {
        !matches!(self, RegistryPhase::Uninitialized | RegistryPhase::Initializing)
    }
}

pub struct RegistrySlot {
    phase: watch::Sender<RegistryPhase>,
    registry: OnceLock<Arc<ModeRegistry>>,
}

impl Default for RegistrySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrySlot {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(RegistryPhase::Uninitialized);
        Self {
            phase,
            registry: OnceLock::new(),
        }
    }

    pub fn phase(&self) -> RegistryPhase {
        *self.phase.borrow()
    }

    /// Move to `Initializing`. Returns false if initialization already
    /// started or the slot is shut down.
    pub fn begin_initializing(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == RegistryPhase::Uninitialized {
                *phase = RegistryPhase::Initializing;
                true
            } else {
                false
            }
        })
    }

    /// Publish the built registry.
    ///
    /// If the slot was shut down in the meantime, or already holds a
    /// registry, `registry` is disposed instead and false is returned.
    pub fn set_ready(&self, registry: ModeRegistry) -> bool {
        let registry = Arc::new(registry);
        if self.registry.set(Arc::clone(&registry)).is_err() {
            registry.shutdown();
            return false;
        }

        let published = self.phase.send_if_modified(|phase| match phase {
            RegistryPhase::Uninitialized | RegistryPhase::Initializing => {
                *phase = RegistryPhase::Ready;
                true
            }
            _ => false,
        });
        if published {
            info!("language modes ready");
        } else {
            debug!("registry finished after shutdown; disposing");
            registry.shutdown();
        }
        published
    }

    /// Record a failed initialization and wake waiters.
    pub fn fail(&self) {
        self.phase.send_if_modified(|phase| {
            if phase.is_settled() {
                false
            } else {
                *phase = RegistryPhase::Failed;
                true
            }
        });
    }

    /// The registry, if it is ready.
    pub fn get(&self) -> Result<Arc<ModeRegistry>> {
        match self.phase() {
            RegistryPhase::Ready => self.registry.get().cloned().ok_or(Error::NotReady),
            RegistryPhase::Disposed => Err(Error::Disposed),
            _ => Err(Error::NotReady),
        }
    }

    /// Wait until initialization has settled, then behave like [`get`](Self::get).
    pub async fn ready(&self) -> Result<Arc<ModeRegistry>> {
        let mut rx = self.phase.subscribe();
        rx.wait_for(|phase| phase.is_settled())
            .await
            .map_err(|_| Error::Disposed)?;
        self.get()
    }

    /// Dispose the registry, if any. Only the first call has any effect.
    pub fn shutdown(&self) -> bool {
        let previous = self.phase.send_replace(RegistryPhase::Disposed);
        if previous == RegistryPhase::Disposed {
            return false;
        }
        if let Some(registry) = self.registry.get() {
            registry.shutdown();
        }
        true
    }
}
