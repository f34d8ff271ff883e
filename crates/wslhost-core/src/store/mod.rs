// # Mapping Store Implementations
//
// This module provides implementations of the MappingStore trait for
// different persistence strategies.

pub mod hosts_file;
pub mod memory;

pub use hosts_file::{HostsFileStore, HostsFileStoreFactory};
pub use memory::{MemoryStore, MemoryStoreFactory};
