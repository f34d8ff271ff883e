//! Core reconciler
//!
//! The Reconciler is responsible for:
//! - Taking a snapshot of environments and managed entries
//! - Deciding which entries to add, update or remove
//! - Issuing those mutations against the MappingStore
//! - Committing the store once, and only if something changed
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐                     ┌───────────────┐
//! │ EnvironmentSource │── environments ──┐  │ MappingStore  │
//! └───────────────────┘   aliases        │  │  (snapshot)   │
//!                                        ▼  └───────┬───────┘
//!                                  ┌────────────┐   │
//!                                  │ Reconciler │◄──┘
//!                                  └─────┬──────┘
//!                                        │ add / update / remove
//!                                        ▼
//!                                ┌───────────────┐
//!                                │ MappingStore  │── commit (once)
//!                                └───────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. List environments, read managed entries
//! 2. Per environment: remove stopped, update moved, add new
//! 3. Re-read managed entries, reconcile aliases against the default environment
//! 4. Commit if any mutation was applied

pub mod ledger;

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ReconcilerConfig;
use crate::error::{Error, PassStage, Result};
use crate::hostname::derive_hostname;
use crate::traits::{
    AliasSet, DefaultEnvironment, EntryTag, Environment, EnvironmentSource, MappedEntry,
    MappingStore,
};

pub use ledger::{CommitLedger, Mutation, MutationOutcome, MutationRecord};

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
    /// Number of environments enumerated
    pub environments: usize,
    /// Mutations issued, in order, with their outcomes
    pub mutations: Vec<MutationRecord>,
    /// Whether any mutation was applied
    pub needs_commit: bool,
    /// Whether the store was committed
    pub committed: bool,
}

impl PassReport {
    /// Mutations the store accepted
    pub fn applied(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations
            .iter()
            .filter(|r| r.outcome.is_applied())
            .map(|r| &r.mutation)
    }

    /// Number of mutations the store rejected
    pub fn failed_count(&self) -> usize {
        self.mutations
            .iter()
            .filter(|r| !r.outcome.is_applied())
            .count()
    }
}

/// Core reconciler
///
/// Owns one environment source and one mapping store. A pass is strictly
/// sequential: leaf calls are never issued concurrently, and passes driven by
/// [`Reconciler::run`] never overlap.
///
/// ## Error Policy
///
/// Fatal (the pass is aborted and wrapped in [`Error::Pass`]):
/// - environment listing fails
/// - a managed entry snapshot cannot be read
/// - a running environment that already has an entry cannot be resolved
/// - the final commit fails
///
/// Everything else is logged, recorded in the [`CommitLedger`], and the pass
/// continues.
pub struct Reconciler {
    /// Environment source
    source: Box<dyn EnvironmentSource>,

    /// Mapping store
    store: Box<dyn MappingStore>,

    /// Reconciler settings
    settings: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `source`: Environment source implementation
    /// - `store`: Mapping store implementation
    /// - `settings`: Reconciler settings
    pub fn new(
        source: Box<dyn EnvironmentSource>,
        store: Box<dyn MappingStore>,
        settings: ReconcilerConfig,
    ) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            source,
            store,
            settings,
        })
    }

    /// Hostname managed for an environment name
    pub fn hostname_for(&self, environment: &str) -> String {
        derive_hostname(environment, &self.settings.suffix)
    }

    /// Run a single reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(PassReport)`: The pass completed (possibly with non-fatal failures)
    /// - `Err(Error::Pass)`: A fatal error aborted the pass
    pub async fn run_pass(&self) -> Result<PassReport> {
        let started_at = Utc::now();
        let mut ledger = CommitLedger::new();

        debug!(
            "Starting pass: source={}, store={}",
            self.source.source_name(),
            self.store.store_name()
        );

        let environments = self.reconcile_environments(&mut ledger).await?;
        self.reconcile_aliases(&mut ledger).await?;

        let needs_commit = ledger.needs_commit();
        if needs_commit {
            self.store
                .commit()
                .await
                .map_err(|e| Error::pass(PassStage::Commit, e))?;
            info!("Committed {}", self.store.store_name());
        } else {
            debug!("No effective changes, skipping commit");
        }

        Ok(PassReport {
            started_at,
            finished_at: Utc::now(),
            environments,
            mutations: ledger.into_records(),
            needs_commit,
            committed: needs_commit,
        })
    }

    /// Reconcile one entry per environment
    ///
    /// Returns the number of environments enumerated.
    async fn reconcile_environments(&self, ledger: &mut CommitLedger) -> Result<usize> {
        let environments = self
            .source
            .list_environments()
            .await
            .map_err(|e| Error::pass(PassStage::ListEnvironments, e))?;
        let entries = self
            .store
            .current_entries()
            .await
            .map_err(|e| Error::pass(PassStage::ReadEntries, e))?;

        // hostnames a running environment will claim; stopped ones never remove these
        let running_hostnames: HashSet<String> = environments
            .iter()
            .filter(|env| env.running)
            .map(|env| self.hostname_for(&env.name))
            .collect();

        // hostname -> environment that claimed it first in this pass
        let mut claimed: HashMap<String, &str> = HashMap::new();

        for env in &environments {
            let hostname = self.hostname_for(&env.name);

            if !env.running {
                if running_hostnames.contains(&hostname) {
                    debug!(
                        "Environment {:?} is stopped, {} stays with a running environment",
                        env.name, hostname
                    );
                    continue;
                }
                if entries.contains_key(&hostname)
                    && claimed.insert(hostname.clone(), &env.name).is_none()
                {
                    debug!("Environment {:?} is stopped, removing {}", env.name, hostname);
                    let result = self.store.remove_entry(&hostname).await;
                    ledger.record(Mutation::Remove { hostname }, result);
                }
                continue;
            }

            if let Some(owner) = claimed.get(&hostname) {
                warn!(
                    "Environment {:?} derives hostname {} already claimed by {:?}, skipping",
                    env.name, hostname, owner
                );
                continue;
            }
            claimed.insert(hostname.clone(), &env.name);

            let resolved = self.resolve(env).await;

            match entries.get(&hostname) {
                Some(existing) => {
                    let address =
                        resolved.map_err(|e| Error::pass(PassStage::ReconcileEnvironments, e))?;
                    if existing.address == address {
                        debug!("{} already points at {}", hostname, address);
                        continue;
                    }
                    let result = self.store.update_address(&hostname, address).await;
                    ledger.record(
                        Mutation::Update {
                            hostname,
                            previous: existing.address,
                            address,
                        },
                        result,
                    );
                }
                None => {
                    let address = match resolved {
                        Ok(address) => address,
                        Err(e) if self.settings.strict_resolution => {
                            return Err(Error::pass(PassStage::ReconcileEnvironments, e));
                        }
                        Err(e) => {
                            warn!("Not adding {}: {}", hostname, e);
                            continue;
                        }
                    };
                    let entry =
                        MappedEntry::new(hostname, address, EntryTag::environment(&env.name));
                    let result = self.store.add_entry(entry.clone()).await;
                    ledger.record(Mutation::Add { entry }, result);
                }
            }
        }

        Ok(environments.len())
    }

    /// Reconcile alias entries against the default environment
    async fn reconcile_aliases(&self, ledger: &mut CommitLedger) -> Result<()> {
        // an unknown default is handled like a stopped one
        let default = self
            .source
            .default_environment()
            .await
            .unwrap_or_else(|e| {
                warn!("Default environment unavailable, treating as stopped: {}", e);
                DefaultEnvironment {
                    name: String::new(),
                    running: false,
                }
            });

        let address = self.default_address(&default).await;
        let desired = self.desired_aliases(&default).await;

        let entries = self
            .store
            .current_entries()
            .await
            .map_err(|e| Error::pass(PassStage::ReadEntries, e))?;

        for (hostname, entry) in entries.iter().filter(|(_, e)| e.tag.is_alias()) {
            if default.running && desired.contains(hostname) {
                let Some(address) = address else {
                    warn!("Keeping {} at {}: default address unknown", hostname, entry.address);
                    continue;
                };
                if entry.address == address {
                    continue;
                }
                let result = self.store.update_address(hostname, address).await;
                ledger.record(
                    Mutation::Update {
                        hostname: hostname.clone(),
                        previous: entry.address,
                        address,
                    },
                    result,
                );
            } else {
                debug!("Alias {} is no longer wanted, removing", hostname);
                let result = self.store.remove_entry(hostname).await;
                ledger.record(
                    Mutation::Remove {
                        hostname: hostname.clone(),
                    },
                    result,
                );
            }
        }

        if !default.running {
            if !desired.is_empty() {
                debug!("Default environment {:?} is stopped, deferring aliases", default.name);
            }
            return Ok(());
        }

        for alias in desired.iter().filter(|a| !entries.contains_key(*a)) {
            let Some(address) = address else {
                warn!("Not adding alias {}: default address unknown", alias);
                continue;
            };
            let entry = MappedEntry::new(alias.clone(), address, EntryTag::alias(&default.name));
            let result = self.store.add_entry(entry.clone()).await;
            ledger.record(Mutation::Add { entry }, result);
        }

        Ok(())
    }

    /// Resolve an environment's address, preferring the source's hint
    async fn resolve(&self, env: &Environment) -> Result<IpAddr> {
        match env.address {
            Some(address) => Ok(address),
            None => self.source.address_of(&env.name).await,
        }
    }

    /// Address of the default environment, if it is running and resolvable
    async fn default_address(&self, default: &DefaultEnvironment) -> Option<IpAddr> {
        // querying a stopped distribution's address would start it
        if !default.running {
            return None;
        }
        match self.source.address_of(&default.name).await {
            Ok(address) => Some(address),
            Err(e) => {
                warn!("Cannot resolve default environment {:?}: {}", default.name, e);
                None
            }
        }
    }

    /// Desired aliases; empty when the default environment is stopped or the query fails
    async fn desired_aliases(&self, default: &DefaultEnvironment) -> AliasSet {
        if !default.running {
            return AliasSet::new();
        }
        self.source.desired_aliases(&default.name).await.unwrap_or_else(|e| {
            warn!("Failed to read aliases, treating as empty: {}", e);
            AliasSet::new()
        })
    }

    /// Run passes on a fixed interval until Ctrl-C
    ///
    /// Errors from individual passes are logged; the loop keeps running.
    pub async fn run(&self, interval: Duration) -> Result<()> {
        self.run_internal(interval, None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(
        &self,
        interval: Duration,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::config("Reconciliation interval must be > 0"));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        info!("Reconciling every {:?}", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_pass().await {
                        Ok(report) => debug!(
                            "Pass finished: {} applied, {} failed, committed={}",
                            report.applied().count(),
                            report.failed_count(),
                            report.committed
                        ),
                        Err(e) => error!("Reconciliation pass failed: {}", e.display_chain()),
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run passes on a fixed interval until `shutdown_rx` fires
    ///
    /// Dropping the sender also stops the loop. Used by the daemon to stop on
    /// SIGTERM as well as Ctrl-C, and by tests.
    pub async fn run_with_shutdown(
        &self,
        interval: Duration,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_internal(interval, Some(shutdown_rx)).await
    }
}
