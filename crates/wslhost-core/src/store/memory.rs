// # Memory Mapping Store
//
// In-memory implementation of MappingStore.
//
// ## Purpose
//
// Provides a simple store that doesn't persist anything. Useful for tests,
// embedding, and dry runs where the hosts file must not be touched.
//
// ## Commit Behavior
//
// - `commit()` only bumps a counter
// - All entries are lost when the store is dropped

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::mapping_store::{MappedEntry, MappingStore, MappingStoreFactory};

/// In-memory mapping store implementation
///
/// Clones share the same entries and commit counter, so a test can keep a
/// handle while the reconciler owns another.
///
/// # Example
///
/// ```rust,no_run
/// use wslhost_core::store::MemoryStore;
/// use wslhost_core::traits::{EntryTag, MappedEntry, MappingStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///
///     store
///         .add_entry(MappedEntry::new(
///             "ubuntu.wsl",
///             "172.20.1.5".parse()?,
///             EntryTag::environment("Ubuntu"),
///         ))
///         .await?;
///     store.commit().await?;
///
///     assert_eq!(store.commit_count(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<String, MappedEntry>>>,
    commits: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries(entries: impl IntoIterator<Item = MappedEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|e| (e.hostname.clone(), e))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of entries in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Look up a single entry
    pub async fn get(&self, hostname: &str) -> Option<MappedEntry> {
        self.inner.read().await.get(hostname).cloned()
    }

    /// Number of times `commit()` was called
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn current_entries(&self) -> Result<BTreeMap<String, MappedEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .iter()
            .filter(|(_, e)| e.tag.is_managed())
            .map(|(h, e)| (h.clone(), e.clone()))
            .collect())
    }

    async fn add_entry(&self, entry: MappedEntry) -> Result<(), Error> {
        if !entry.tag.is_managed() {
            return Err(Error::write(format!(
                "Refusing to add unmanaged entry {}",
                entry.hostname
            )));
        }

        let mut guard = self.inner.write().await;
        if guard.contains_key(&entry.hostname) {
            return Err(Error::write(format!("{} already exists", entry.hostname)));
        }
        guard.insert(entry.hostname.clone(), entry);
        Ok(())
    }

    async fn update_address(&self, hostname: &str, address: IpAddr) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(hostname) {
            Some(entry) if entry.tag.is_managed() => {
                entry.address = address;
                Ok(())
            }
            _ => Err(Error::not_found(hostname)),
        }
    }

    async fn remove_entry(&self, hostname: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        match guard.get(hostname) {
            Some(entry) if entry.tag.is_managed() => {
                guard.remove(hostname);
                Ok(())
            }
            _ => Err(Error::not_found(hostname)),
        }
    }

    async fn commit(&self) -> Result<(), Error> {
        // Nothing to persist
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory stores
pub struct MemoryStoreFactory;

#[async_trait]
impl MappingStoreFactory for MemoryStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn MappingStore>, Error> {
        Ok(Box::new(MemoryStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::EntryTag;

    fn entry(hostname: &str, ip: &str, tag: EntryTag) -> MappedEntry {
        MappedEntry::new(hostname, ip.parse().unwrap(), tag)
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        // Initially empty
        assert!(store.is_empty().await);

        store
            .add_entry(entry("ubuntu.wsl", "10.0.0.2", EntryTag::environment("Ubuntu")))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        store
            .update_address("ubuntu.wsl", "10.0.0.3".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(
            store.get("ubuntu.wsl").await.unwrap().address,
            "10.0.0.3".parse::<IpAddr>().unwrap()
        );

        store.remove_entry("ubuntu.wsl").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicates_and_missing() {
        let store = MemoryStore::new();
        let e = entry("ubuntu.wsl", "10.0.0.2", EntryTag::environment("Ubuntu"));

        store.add_entry(e.clone()).await.unwrap();
        assert!(matches!(store.add_entry(e).await, Err(Error::Write(_))));
        assert!(matches!(
            store.remove_entry("debian.wsl").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store
                .update_address("debian.wsl", "10.0.0.9".parse().unwrap())
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_hides_unmanaged() {
        let store = MemoryStore::with_entries([
            entry("router.lan", "192.168.1.1", EntryTag::Unmanaged),
            entry("ubuntu.wsl", "10.0.0.2", EntryTag::environment("Ubuntu")),
        ]);

        let entries = store.current_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("ubuntu.wsl"));
        assert!(store.remove_entry("router.lan").await.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store.commit().await.unwrap();
        store
            .add_entry(entry("alias.local", "10.0.0.2", EntryTag::alias("Ubuntu")))
            .await
            .unwrap();

        assert_eq!(handle.commit_count(), 1);
        assert_eq!(handle.len().await, 1);
    }
}
