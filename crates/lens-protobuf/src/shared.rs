//! Atomically swappable registry handle.

use crate::error::LoadError;
use crate::registry::{SchemaRegistry, TopicMapping};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{info, warn};

/// A [`SchemaRegistry`] shared between long-lived callers.
///
/// Readers take a snapshot with [`snapshot`](Self::snapshot) and keep using
/// it for the duration of a decode; a concurrent [`reload`](Self::reload)
/// replaces the registry for subsequent snapshots without blocking them.
/// Clones share the same underlying registry.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    inner: Arc<ArcSwap<SchemaRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    pub fn build(mappings: &[TopicMapping]) -> Result<Self, LoadError> {
        Ok(Self::new(SchemaRegistry::build(mappings)?))
    }

    /// The current registry.
    pub fn snapshot(&self) -> Arc<SchemaRegistry> {
        self.inner.load_full()
    }

    /// Build a registry from `mappings` and swap it in.
    ///
    /// On error the current registry stays in place.
    pub fn reload(&self, mappings: &[TopicMapping]) -> Result<(), LoadError> {
        match SchemaRegistry::build(mappings) {
            Ok(registry) => {
                self.replace(registry);
                Ok(())
            }
            Err(e) => {
                warn!("Registry reload failed, keeping previous registry: {}", e);
                Err(e)
            }
        }
    }

    pub fn replace(&self, registry: SchemaRegistry) {
        info!("Swapping in registry with {} topic mappings", registry.len());
        self.inner.store(Arc::new(registry));
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new(SchemaRegistry::default())
    }
}
