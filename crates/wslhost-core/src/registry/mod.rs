//! Plugin-based source and store registry
//!
//! The registry allows environment sources and mapping stores to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wslhost_core::registry::SourceRegistry;
//! use wslhost_core::config::WslHostConfig;
//!
//! let registry = SourceRegistry::with_builtin_stores();
//! wslhost_wsl::register(&registry);
//!
//! let config = WslHostConfig::default();
//! let source = registry.create_source(&config.source)?;
//! let store = registry.create_store(&config.store).await?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! // In wslhost-wsl crate
//! pub fn register(registry: &SourceRegistry) {
//!     registry.register_source("wsl", Box::new(WslSourceFactory));
//! }
//! ```

use crate::config::{SourceConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{HostsFileStoreFactory, MemoryStoreFactory};
use crate::traits::{EnvironmentSource, EnvironmentSourceFactory, MappingStore, MappingStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry for plugin-based source and store creation
///
/// Maps type names (as returned by `SourceConfig::type_name` and
/// `StoreConfig::type_name`) to factory objects.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct SourceRegistry {
    /// Registered environment source factories
    sources: RwLock<HashMap<String, Box<dyn EnvironmentSourceFactory>>>,

    /// Registered mapping store factories
    stores: RwLock<HashMap<String, Arc<dyn MappingStoreFactory>>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `hosts_file` and `memory` stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("hosts_file", Box::new(HostsFileStoreFactory));
        registry.register_store("memory", Box::new(MemoryStoreFactory));
        registry
    }

    /// Register an environment source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "wsl")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn EnvironmentSourceFactory>,
    ) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Register a mapping store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "hosts_file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn MappingStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create an environment source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn EnvironmentSource>)`: Created source instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn EnvironmentSource>> {
        let source_type = config.type_name();
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sources.get(source_type).ok_or_else(|| {
            Error::config(format!("Unknown environment source type: {}", source_type))
        })?;

        factory.create(config)
    }

    /// Create a mapping store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn MappingStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn MappingStore>> {
        let store_type = config.type_name();

        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .ok_or_else(|| Error::config(format!("Unknown mapping store type: {}", store_type)))?
                .clone()
        };

        // Custom stores receive their own config blob
        let config_json = match config {
            StoreConfig::Custom { config, .. } => config.clone(),
            _ => serde_json::to_value(config)?,
        };

        factory.create(&config_json).await
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
