//! Registry of filter templates, looked up by name.

use super::template::FilterTemplate;
use crate::error::{Error, Result};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Default number of templates a registry holds.
pub const DEFAULT_CAPACITY: usize = 64;

/// Bounded registry mapping unique names to filter templates.
pub struct FilterRegistry {
    filters: RwLock<Vec<Arc<FilterTemplate>>>,
    capacity: usize,
}

impl FilterRegistry {
    /// Create an empty registry with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty registry holding at most `capacity` templates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            filters: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// The process-wide registry, with every built-in filter registered.
    pub fn global() -> Arc<FilterRegistry> {
        static GLOBAL: OnceLock<Arc<FilterRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            let registry = FilterRegistry::new();
            if let Err(e) = crate::filters::register_all(&registry) {
                tracing::error!(error = %e, "failed to register built-in filters");
            }
            Arc::new(registry)
        }))
    }

    /// Register a template.
    ///
    /// # Errors
    ///
    /// Fails when the registry is full or the name is taken.
    pub fn register(&self, template: Arc<FilterTemplate>) -> Result<()> {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        if filters.len() >= self.capacity {
            return Err(Error::RegistryFull {
                capacity: self.capacity,
            });
        }
        if filters.iter().any(|f| f.name() == template.name()) {
            return Err(Error::DuplicateFilter(template.name().to_string()));
        }
        tracing::debug!(filter = %template.name(), "registered filter");
        filters.push(template);
        Ok(())
    }

    /// Look a template up by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<FilterTemplate>> {
        let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
        filters.iter().find(|f| f.name() == name).cloned()
    }

    /// All templates, in registration order.
    pub fn filters(&self) -> Vec<Arc<FilterTemplate>> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of all templates, in registration order.
    pub fn names(&self) -> Vec<String> {
        let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
        filters.iter().map(|f| f.name().to_string()).collect()
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of templates.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every template.
    pub fn clear(&self) {
        self.filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
