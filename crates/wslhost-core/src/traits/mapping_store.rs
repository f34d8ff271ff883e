// # Mapping Store Trait
//
// Defines the interface for the persisted hostname → address mapping.
//
// ## Purpose
//
// The store owns the persisted mapping (typically the system hosts file).
// It hands the reconciler a snapshot of the entries this tool manages,
// buffers per-entry mutations, and persists them in a single commit.
//
// ## Implementations
//
// - Hosts file: `HostsFileStore`
// - In-memory: `MemoryStore` (tests, embedding)
//
// ## Usage
//
// ```rust,ignore
// use wslhost_core::{MappingStore, MappedEntry, EntryTag};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* MappingStore implementation */;
//
//     store.add_entry(MappedEntry::new(
//         "ubuntu.wsl",
//         "172.20.1.5".parse()?,
//         EntryTag::environment("Ubuntu"),
//     )).await?;
//     store.commit().await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Provenance of a persisted entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryTag {
    /// Owned by an environment
    Environment {
        /// Owning environment name (empty when the persisted marker predates it)
        name: String,
    },
    /// Owned by the alias mechanism
    Alias {
        /// Default environment the alias was created for
        provenance: String,
    },
    /// Not managed by this tool
    Unmanaged,
}

impl EntryTag {
    /// Tag for an environment-owned entry
    pub fn environment(name: impl Into<String>) -> Self {
        Self::Environment { name: name.into() }
    }

    /// Tag for an alias entry
    pub fn alias(provenance: impl Into<String>) -> Self {
        Self::Alias {
            provenance: provenance.into(),
        }
    }

    /// Whether the entry is owned by the alias mechanism
    pub fn is_alias(&self) -> bool {
        matches!(self, Self::Alias { .. })
    }

    /// Whether this tool may touch the entry
    pub fn is_managed(&self) -> bool {
        !matches!(self, Self::Unmanaged)
    }
}

/// A persisted hostname → address entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedEntry {
    /// Hostname, unique within the managed set
    pub hostname: String,
    /// Address the hostname resolves to
    pub address: IpAddr,
    /// Ownership tag
    pub tag: EntryTag,
}

impl MappedEntry {
    /// Create a new entry
    pub fn new(hostname: impl Into<String>, address: IpAddr, tag: EntryTag) -> Self {
        Self {
            hostname: hostname.into(),
            address,
            tag,
        }
    }
}

/// Trait for mapping store implementations
///
/// # Ownership
///
/// [`current_entries`](MappingStore::current_entries) returns only entries
/// whose tag is managed. Foreign entries are invisible to the reconciler and
/// must survive every commit untouched.
///
/// # Buffering
///
/// `add_entry`, `update_address` and `remove_entry` may buffer in memory;
/// nothing is guaranteed durable until [`commit`](MappingStore::commit)
/// succeeds. The reconciler calls `commit` at most once per pass.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Snapshot of the managed entries, keyed by hostname
    async fn current_entries(&self) -> Result<BTreeMap<String, MappedEntry>, crate::Error>;

    /// Add a new managed entry
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Entry added
    /// - `Err(Error::Write)`: Hostname already present, invalid, or unmanaged tag
    async fn add_entry(&self, entry: MappedEntry) -> Result<(), crate::Error>;

    /// Point an existing managed entry at a new address
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Entry updated
    /// - `Err(Error::NotFound)`: No managed entry for `hostname`
    /// - `Err(Error::Write)`: Storage rejected the change
    async fn update_address(&self, hostname: &str, address: IpAddr) -> Result<(), crate::Error>;

    /// Remove a managed entry
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Entry removed
    /// - `Err(Error::NotFound)`: No managed entry for `hostname`
    /// - `Err(Error::Write)`: Storage rejected the change
    async fn remove_entry(&self, hostname: &str) -> Result<(), crate::Error>;

    /// Persist all buffered mutations
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Mapping persisted
    /// - `Err(Error::Persist)`: Underlying storage could not be written
    async fn commit(&self) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing mapping stores from configuration
#[async_trait]
pub trait MappingStoreFactory: Send + Sync {
    /// Create a MappingStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Serialized [`StoreConfig`](crate::config::StoreConfig)
    async fn create(&self, config: &serde_json::Value)
    -> Result<Box<dyn MappingStore>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_classification() {
        assert!(EntryTag::alias("Ubuntu").is_alias());
        assert!(EntryTag::alias("Ubuntu").is_managed());
        assert!(!EntryTag::environment("Ubuntu").is_alias());
        assert!(EntryTag::environment("Ubuntu").is_managed());
        assert!(!EntryTag::Unmanaged.is_managed());
    }

    #[test]
    fn test_tag_serialization() {
        let json = serde_json::to_value(EntryTag::environment("Debian")).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "environment", "name": "Debian" }));
    }
}
