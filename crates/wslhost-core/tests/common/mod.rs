//! Test doubles and common utilities for reconciliation contract tests
//!
//! This module provides scripted leaf collaborators that let each test pin
//! down exactly what the environment source reports and which store calls
//! fail.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wslhost_core::error::{Error, Result};
use wslhost_core::store::MemoryStore;
use wslhost_core::traits::{
    AliasSet, DefaultEnvironment, EntryTag, Environment, EnvironmentSource, MappedEntry,
    MappingStore,
};
use wslhost_core::{Reconciler, ReconcilerConfig};

pub const SUFFIX: &str = ".wsl";

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid test address")
}

/// Environment source whose answers are fixed up front
#[derive(Clone, Default)]
pub struct ScriptedSource {
    environments: Option<Vec<Environment>>,
    addresses: HashMap<String, IpAddr>,
    default: Option<DefaultEnvironment>,
    aliases: Option<AliasSet>,
    /// Names passed to address_of(), in call order
    lookups: Arc<Mutex<Vec<String>>>,
    /// Default names passed to desired_aliases(), in call order
    alias_reads: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            environments: Some(Vec::new()),
            aliases: Some(AliasSet::new()),
            ..Self::default()
        }
    }

    /// Add an environment; running environments get `address` registered for lookup
    pub fn with_environment(mut self, name: &str, running: bool, address: Option<&str>) -> Self {
        let env = if running {
            Environment::running(name)
        } else {
            Environment::stopped(name)
        };
        if let Some(address) = address {
            self.addresses.insert(name.to_string(), ip(address));
        }
        self.environments
            .get_or_insert_with(Vec::new)
            .push(env);
        self
    }

    /// Add an environment as-is
    pub fn with_raw_environment(mut self, env: Environment) -> Self {
        self.environments.get_or_insert_with(Vec::new).push(env);
        self
    }

    /// Make list_environments() fail
    pub fn failing_listing(mut self) -> Self {
        self.environments = None;
        self
    }

    pub fn with_default(mut self, name: &str, running: bool) -> Self {
        self.default = Some(DefaultEnvironment {
            name: name.to_string(),
            running,
        });
        self
    }

    /// Register an address without listing an environment
    pub fn with_address(mut self, name: &str, address: &str) -> Self {
        self.addresses.insert(name.to_string(), ip(address));
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = Some(aliases.iter().map(|a| a.to_string()).collect());
        self
    }

    /// Make desired_aliases() fail
    pub fn failing_aliases(mut self) -> Self {
        self.aliases = None;
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn alias_calls(&self) -> usize {
        self.alias_reads.lock().unwrap().len()
    }

    pub fn alias_reads(&self) -> Vec<String> {
        self.alias_reads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EnvironmentSource for ScriptedSource {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        self.environments
            .clone()
            .ok_or_else(|| Error::query("wsl.exe -l -v exited with status 1"))
    }

    async fn address_of(&self, name: &str) -> Result<IpAddr> {
        self.lookups.lock().unwrap().push(name.to_string());
        self.addresses
            .get(name)
            .copied()
            .ok_or_else(|| Error::resolution(name, "hostname -I returned nothing"))
    }

    async fn default_environment(&self) -> Result<DefaultEnvironment> {
        self.default
            .clone()
            .ok_or_else(|| Error::query("no default distribution"))
    }

    async fn desired_aliases(&self, default: &str) -> Result<AliasSet> {
        self.alias_reads.lock().unwrap().push(default.to_string());
        self.aliases
            .clone()
            .ok_or_else(|| Error::query("alias file unreadable"))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Memory store with injectable failures
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    /// Hostnames whose add/update/remove calls fail
    failing: HashSet<String>,
    /// Whether commit() fails
    fail_commit: bool,
    /// Call counter for commit(), including failed attempts
    commit_attempts: Arc<AtomicUsize>,
    /// Call counter for current_entries()
    snapshot_calls: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = MappedEntry>) -> Self {
        Self {
            inner: MemoryStore::with_entries(entries),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, hostname: &str) -> Self {
        self.failing.insert(hostname.to_string());
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub async fn get(&self, hostname: &str) -> Option<MappedEntry> {
        self.inner.get(hostname).await
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    fn check(&self, hostname: &str) -> Result<()> {
        if self.failing.contains(hostname) {
            return Err(Error::write(format!("{} is locked", hostname)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MappingStore for FlakyStore {
    async fn current_entries(&self) -> Result<std::collections::BTreeMap<String, MappedEntry>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.current_entries().await
    }

    async fn add_entry(&self, entry: MappedEntry) -> Result<()> {
        self.check(&entry.hostname)?;
        self.inner.add_entry(entry).await
    }

    async fn update_address(&self, hostname: &str, address: IpAddr) -> Result<()> {
        self.check(hostname)?;
        self.inner.update_address(hostname, address).await
    }

    async fn remove_entry(&self, hostname: &str) -> Result<()> {
        self.check(hostname)?;
        self.inner.remove_entry(hostname).await
    }

    async fn commit(&self) -> Result<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(Error::persist("access denied writing hosts file"));
        }
        self.inner.commit().await
    }

    fn store_name(&self) -> &'static str {
        "flaky"
    }
}

pub fn env_entry(hostname: &str, address: &str, owner: &str) -> MappedEntry {
    MappedEntry::new(hostname, ip(address), EntryTag::environment(owner))
}

pub fn alias_entry(hostname: &str, address: &str, provenance: &str) -> MappedEntry {
    MappedEntry::new(hostname, ip(address), EntryTag::alias(provenance))
}

/// Build a reconciler over clones of the given doubles
pub fn reconciler(source: &ScriptedSource, store: &FlakyStore) -> Reconciler {
    reconciler_with(source, store, ReconcilerConfig::default())
}

pub fn reconciler_with(
    source: &ScriptedSource,
    store: &FlakyStore,
    settings: ReconcilerConfig,
) -> Reconciler {
    Reconciler::new(Box::new(source.clone()), Box::new(store.clone()), settings)
        .expect("reconciler construction succeeds")
}
