//! Core traits for the wslhost system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`EnvironmentSource`]: Enumerate environments, addresses and aliases
//! - [`MappingStore`]: Persisted hostname → address mapping

pub mod environment_source;
pub mod mapping_store;

pub use environment_source::{
    AliasSet, DefaultEnvironment, Environment, EnvironmentSource, EnvironmentSourceFactory,
};
pub use mapping_store::{EntryTag, MappedEntry, MappingStore, MappingStoreFactory};
