//! Store registry for resolving a backend by name.

use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;
use tracing::{debug, warn};

use offsync_common::{Error, Result};
use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::store::KeyValueStore;

/// Factory function type for creating stores.
pub type StoreFactory = Box<dyn Fn(Value) -> Result<Arc<dyn KeyValueStore>> + Send + Sync>;

/// Backend name to store constructor.
///
/// The CLI config names a backend and passes its JSON options through
/// unchanged; the factory validates them.
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a store factory.
    ///
    /// # Errors
    /// - Returns error if `name` is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Store backend '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by backend name and options.
    ///
    /// # Errors
    /// - Backend not registered
    /// - Options invalid for the backend
    pub fn resolve(&self, name: &str, options: Value) -> Result<Arc<dyn KeyValueStore>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            Error::NotFound(format!("Store backend '{}' is not registered", name))
        })?;

        debug!("Opening {} store", name);
        factory(options).inspect_err(|e| warn!("Failed to open {} store: {}", name, e))
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the built-in backends.
///
/// - `memory`: no options
/// - `file`: `{"root": "<directory>"}`
pub fn create_default_registry() -> Result<StoreRegistry> {
    let mut registry = StoreRegistry::new();
    registry.register("memory", Box::new(open_memory))?;
    registry.register("file", Box::new(open_file))?;
    Ok(registry)
}

fn open_memory(_options: Value) -> Result<Arc<dyn KeyValueStore>> {
    Ok(Arc::new(MemoryStore::new()))
}

fn open_file(options: Value) -> Result<Arc<dyn KeyValueStore>> {
    let root = options
        .get("root")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Config("File store requires a 'root' directory".to_string()))?;
    Ok(Arc::new(FileStore::new(root)?))
}
