//! Per-mutation bookkeeping for a reconciliation pass
//!
//! Every add/update/remove the reconciler issues is recorded here together
//! with its outcome. A failed mutation is kept in the ledger for reporting but
//! never counts towards [`CommitLedger::needs_commit`].

use serde::Serialize;
use std::net::IpAddr;
use tracing::{info, warn};

use crate::error::Result;
use crate::traits::MappedEntry;

/// A mutation issued against the mapping store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// New managed entry
    Add {
        /// Entry that was added
        entry: MappedEntry,
    },
    /// Existing managed entry pointed at a new address
    Update {
        /// Hostname of the entry
        hostname: String,
        /// Address stored before the update
        previous: IpAddr,
        /// Address stored after the update
        address: IpAddr,
    },
    /// Managed entry removed
    Remove {
        /// Hostname of the entry
        hostname: String,
    },
}

impl Mutation {
    /// Hostname the mutation applies to
    pub fn hostname(&self) -> &str {
        match self {
            Mutation::Add { entry } => &entry.hostname,
            Mutation::Update { hostname, .. } | Mutation::Remove { hostname } => hostname,
        }
    }
}

/// Outcome of a single mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The store accepted the mutation
    Applied,
    /// The store rejected the mutation; the pass continued
    Failed {
        /// Rendered store error
        error: String,
    },
}

impl MutationOutcome {
    /// Whether the mutation took effect
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

/// A mutation and what happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRecord {
    /// The mutation
    pub mutation: Mutation,
    /// Its outcome
    pub outcome: MutationOutcome,
}

/// Aggregates mutation outcomes and decides whether a commit is needed
#[derive(Debug, Default)]
pub struct CommitLedger {
    records: Vec<MutationRecord>,
}

impl CommitLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of a store call
    ///
    /// Returns `true` if the mutation was applied.
    pub fn record(&mut self, mutation: Mutation, result: Result<()>) -> bool {
        let outcome = match result {
            Ok(()) => {
                match &mutation {
                    Mutation::Add { entry } => {
                        info!("Added {} -> {}", entry.hostname, entry.address)
                    }
                    Mutation::Update {
                        hostname,
                        previous,
                        address,
                    } => info!("Updated {} -> {} (previous: {})", hostname, address, previous),
                    Mutation::Remove { hostname } => info!("Removed {}", hostname),
                }
                MutationOutcome::Applied
            }
            Err(e) => {
                warn!("Mutation on {} failed: {}", mutation.hostname(), e);
                MutationOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let applied = outcome.is_applied();
        self.records.push(MutationRecord { mutation, outcome });
        applied
    }

    /// Whether at least one mutation changed the store
    pub fn needs_commit(&self) -> bool {
        self.records.iter().any(|r| r.outcome.is_applied())
    }

    /// All recorded mutations, in issue order
    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// Consume the ledger
    pub fn into_records(self) -> Vec<MutationRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn remove(hostname: &str) -> Mutation {
        Mutation::Remove {
            hostname: hostname.to_string(),
        }
    }

    #[test]
    fn test_empty_ledger_needs_no_commit() {
        let ledger = CommitLedger::new();
        assert!(!ledger.needs_commit());
        assert!(ledger.records().is_empty());
    }

    #[test]
    fn test_failures_do_not_need_commit() {
        let mut ledger = CommitLedger::new();

        assert!(!ledger.record(remove("a.wsl"), Err(Error::not_found("a.wsl"))));
        assert!(!ledger.record(remove("b.wsl"), Err(Error::write("read-only"))));

        assert!(!ledger.needs_commit());
        assert_eq!(ledger.records().len(), 2);
    }

    #[test]
    fn test_single_success_needs_commit() {
        let mut ledger = CommitLedger::new();

        ledger.record(remove("a.wsl"), Err(Error::not_found("a.wsl")));
        assert!(ledger.record(remove("b.wsl"), Ok(())));

        assert!(ledger.needs_commit());
        let records = ledger.into_records();
        assert_eq!(records[0].mutation.hostname(), "a.wsl");
        assert!(!records[0].outcome.is_applied());
        assert!(records[1].outcome.is_applied());
    }
}
