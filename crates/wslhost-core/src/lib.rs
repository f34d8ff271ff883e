// # wslhost-core
//
// Core library for keeping hosts-file entries in sync with WSL environments.
//
// ## Architecture Overview
//
// This library provides the core functionality for hostname reconciliation:
// - **EnvironmentSource**: Trait for enumerating environments, addresses and aliases
// - **MappingStore**: Trait for the persisted hostname → address mapping
// - **Reconciler**: Core logic that turns both snapshots into add/update/remove calls
// - **SourceRegistry**: Plugin-based registry for sources and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decisions live in the reconciler, I/O in the leaves
// 2. **Ownership Tags**: Only entries carrying this tool's marker are ever touched
// 3. **Single Commit**: A pass writes the store at most once, and only on change
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod hostname;
pub mod reconciler;
pub mod registry;
pub mod config;
pub mod error;
pub mod store;

// Re-export core types for convenience
pub use traits::{
    AliasSet, DefaultEnvironment, EntryTag, Environment, EnvironmentSource, MappedEntry,
    MappingStore,
};
pub use hostname::{derive_hostname, DEFAULT_SUFFIX};
pub use reconciler::{Mutation, MutationOutcome, PassReport, Reconciler};
pub use registry::SourceRegistry;
pub use config::{ReconcilerConfig, SourceConfig, StoreConfig, WslHostConfig};
pub use error::{Error, PassStage, Result};
pub use store::{HostsFileStore, MemoryStore};
