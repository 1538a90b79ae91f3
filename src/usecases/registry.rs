//! Adapter Registry - Platform Key to Source Adapter Mapping
//!
//! Populated once at startup, then shared read-only behind an `Arc`.
//! Registration takes `&mut self`, so it cannot race a running refresh.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::platform::normalize_key;
use crate::ports::SourceAdapter;

/// Mapping from lowercase platform key to adapter.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a fixed adapter list.
    pub fn with_adapters(adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        let mut registry = Self::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    /// Add or overwrite the adapter for its platform key.
    ///
    /// Returns the adapter it replaced, if any.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Option<Arc<dyn SourceAdapter>> {
        let key = normalize_key(adapter.name());
        let previous = self.adapters.insert(key.clone(), adapter);
        if previous.is_some() {
            warn!(platform = %key, "Adapter registration overwrote an existing adapter");
        } else {
            info!(platform = %key, "Adapter registered");
        }
        previous
    }

    /// O(1) lookup; any ASCII case is accepted.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&normalize_key(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(&normalize_key(name))
    }

    /// Every registered adapter, keyed by platform.
    pub fn all(&self) -> &HashMap<String, Arc<dyn SourceAdapter>> {
        &self.adapters
    }

    /// Registered keys in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
