//! Minimal embedding example for wslhost-core
//!
//! This example drives the reconciler from an application-owned environment
//! source and an in-memory store. Each pass is triggered explicitly.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use wslhost_core::traits::{AliasSet, DefaultEnvironment, Environment, EnvironmentSource};
use wslhost_core::{Error, MappingStore, MemoryStore, Reconciler, ReconcilerConfig, Result};

/// Environment source whose contents the application edits between passes
#[derive(Clone, Default)]
struct EmbeddedSource {
    state: Arc<Mutex<EmbeddedState>>,
}

#[derive(Default)]
struct EmbeddedState {
    environments: Vec<(String, Option<IpAddr>)>,
    default: Option<String>,
    aliases: AliasSet,
}

impl EmbeddedSource {
    fn edit(&self, f: impl FnOnce(&mut EmbeddedState)) {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn with_state<T>(&self, f: impl FnOnce(&EmbeddedState) -> T) -> T {
        f(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait::async_trait]
impl EnvironmentSource for EmbeddedSource {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        Ok(self.with_state(|s| {
            s.environments
                .iter()
                .map(|(name, address)| match address {
                    Some(address) => Environment::running(name.clone()).with_address(*address),
                    None => Environment::stopped(name.clone()),
                })
                .collect()
        }))
    }

    async fn address_of(&self, name: &str) -> Result<IpAddr> {
        self.with_state(|s| {
            s.environments
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, address)| *address)
        })
        .ok_or_else(|| Error::resolution(name, "not running"))
    }

    async fn default_environment(&self) -> Result<DefaultEnvironment> {
        self.with_state(|s| {
            let name = s.default.clone()?;
            let running = s
                .environments
                .iter()
                .any(|(n, address)| *n == name && address.is_some());
            Some(DefaultEnvironment { name, running })
        })
        .ok_or_else(|| Error::query("no default environment"))
    }

    async fn desired_aliases(&self, _default: &str) -> Result<AliasSet> {
        Ok(self.with_state(|s| s.aliases.clone()))
    }

    fn source_name(&self) -> &'static str {
        "embedded"
    }
}

async fn print_store(store: &MemoryStore) -> Result<()> {
    for (hostname, entry) in store.current_entries().await? {
        println!("   {:<16} {:<12} {:?}", hostname, entry.address, entry.tag);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    println!("=== Embedded wslhost-core Example ===\n");

    let source = EmbeddedSource::default();
    source.edit(|s| {
        s.environments = vec![
            ("Ubuntu-22.04".to_string(), Some(IpAddr::from([172, 20, 1, 5]))),
            ("Debian".to_string(), None),
        ];
        s.default = Some("Ubuntu-22.04".to_string());
        s.aliases = ["myapp.local".to_string()].into_iter().collect();
    });

    // Clones share state, so the application keeps a handle for inspection
    let store = MemoryStore::new();
    let reconciler = Reconciler::new(
        Box::new(source.clone()),
        Box::new(store.clone()),
        ReconcilerConfig::default(),
    )?;

    println!("1. First pass");
    let report = reconciler.run_pass().await?;
    println!("   {} mutation(s), committed={}", report.mutations.len(), report.committed);
    print_store(&store).await?;

    println!("\n2. Ubuntu restarts with a new address, Debian starts");
    source.edit(|s| {
        s.environments = vec![
            ("Ubuntu-22.04".to_string(), Some(IpAddr::from([172, 20, 7, 9]))),
            ("Debian".to_string(), Some(IpAddr::from([172, 20, 7, 10]))),
        ];
    });
    let report = reconciler.run_pass().await?;
    println!("   {} mutation(s), committed={}", report.mutations.len(), report.committed);
    print_store(&store).await?;

    println!("\n3. Nothing changed");
    let report = reconciler.run_pass().await?;
    println!("   {} mutation(s), committed={}", report.mutations.len(), report.committed);

    println!("\n4. Default environment stops");
    source.edit(|s| s.environments[0].1 = None);
    let report = reconciler.run_pass().await?;
    println!("   {} mutation(s), committed={}", report.mutations.len(), report.committed);
    print_store(&store).await?;

    println!("\nStore committed {} time(s)", store.commit_count());
    Ok(())
}
