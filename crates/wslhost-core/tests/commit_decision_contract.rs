//! Contract Test: Commit Decision
//!
//! This test verifies that a pass commits the store exactly once when, and
//! only when, at least one mutation was applied.
//!
//! Constraints verified:
//! - Zero effective changes means zero commits
//! - Rejected mutations do not count as changes
//! - A failing commit is reported as a fatal pass error
//! - A full pass against a real hosts file leaves foreign lines untouched

mod common;

use common::*;
use wslhost_core::store::HostsFileStore;
use wslhost_core::traits::{EntryTag, MappingStore};
use wslhost_core::{Error, Mutation, PassStage, Reconciler, ReconcilerConfig};

#[tokio::test]
async fn single_environment_scenario() {
    let source = ScriptedSource::new()
        .with_environment("Ubuntu-18.04", true, Some("10.0.0.2"))
        .with_environment("Debian", false, None)
        .with_default("Ubuntu-18.04", true);
    let store = FlakyStore::new();

    let report = reconciler(&source, &store).run_pass().await.unwrap();

    assert_eq!(report.environments, 2);
    assert_eq!(
        report.applied().collect::<Vec<_>>(),
        vec![&Mutation::Add {
            entry: env_entry("ubuntu1804.wsl", "10.0.0.2", "Ubuntu-18.04"),
        }]
    );
    assert_eq!(store.len().await, 1);
    assert_eq!(store.commit_attempts(), 1);
    assert!(report.committed);
}

#[tokio::test]
async fn no_changes_means_no_commit() {
    let source = ScriptedSource::new()
        .with_environment("Ubuntu", true, Some("10.0.0.2"))
        .with_environment("Debian", false, None)
        .with_default("Ubuntu", true)
        .with_aliases(&["myapp.local"]);
    let store = FlakyStore::with_entries([
        env_entry("ubuntu.wsl", "10.0.0.2", "Ubuntu"),
        alias_entry("myapp.local", "10.0.0.2", "Ubuntu"),
    ]);

    // Several passes over a converged store
    let reconciler = reconciler(&source, &store);
    for _ in 0..3 {
        let report = reconciler.run_pass().await.unwrap();
        assert!(report.mutations.is_empty());
        assert!(!report.needs_commit);
    }

    assert_eq!(store.commit_attempts(), 0);
}

#[tokio::test]
async fn second_pass_after_convergence_is_quiet() {
    let source = ScriptedSource::new()
        .with_environment("Ubuntu", true, Some("10.0.0.2"))
        .with_default("Ubuntu", true)
        .with_aliases(&["myapp.local"]);
    let store = FlakyStore::new();
    let reconciler = reconciler(&source, &store);

    let first = reconciler.run_pass().await.unwrap();
    assert_eq!(first.applied().count(), 2);

    let second = reconciler.run_pass().await.unwrap();
    assert!(second.mutations.is_empty());
    assert_eq!(store.commit_attempts(), 1);
}

#[tokio::test]
async fn only_failed_mutations_means_no_commit() {
    let source = ScriptedSource::new()
        .with_environment("Ubuntu", true, Some("10.0.0.2"))
        .with_default("Ubuntu", false);
    let store = FlakyStore::new().failing_on("ubuntu.wsl");

    let report = reconciler(&source, &store).run_pass().await.unwrap();

    assert_eq!(report.failed_count(), 1);
    assert!(!report.needs_commit);
    assert!(!report.committed);
    assert_eq!(store.commit_attempts(), 0);
}

#[tokio::test]
async fn commit_failure_is_fatal() {
    let source = ScriptedSource::new()
        .with_environment("Ubuntu", true, Some("10.0.0.2"))
        .with_default("Ubuntu", true);
    let store = FlakyStore::new().failing_commit();

    let err = reconciler(&source, &store).run_pass().await.unwrap_err();

    assert_eq!(err.stage(), Some(PassStage::Commit));
    match &err {
        Error::Pass { source, .. } => assert!(matches!(**source, Error::Persist(_))),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.display_chain().contains("access denied"));
    assert_eq!(store.commit_attempts(), 1);
}

#[tokio::test]
async fn full_pass_against_hosts_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    tokio::fs::write(
        &path,
        "# Copyright (c) Microsoft Corp.\n\
         127.0.0.1 localhost\n\
         10.0.0.1 ubuntu.wsl # wsl2-host env=Ubuntu\n\
         10.0.0.3 debian.wsl # wsl2-host env=Debian\n\
         10.0.0.1 old.local # wsl2-host alias=Ubuntu\n\
         192.168.1.10 nas.lan # added by hand\n",
    )
    .await
    .unwrap();

    let source = ScriptedSource::new()
        .with_environment("Ubuntu", true, Some("10.0.0.2"))
        .with_environment("Debian", false, None)
        .with_default("Ubuntu", true)
        .with_aliases(&["myapp.local"]);
    let store = HostsFileStore::open(&path, "wsl2-host").await.unwrap();
    let reconciler = Reconciler::new(
        Box::new(source.clone()),
        Box::new(store),
        ReconcilerConfig::default(),
    )
    .unwrap();

    let report = reconciler.run_pass().await.unwrap();
    assert!(report.committed);
    assert_eq!(report.failed_count(), 0);

    let written = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(
        written,
        "# Copyright (c) Microsoft Corp.\n\
         127.0.0.1 localhost\n\
         192.168.1.10 nas.lan # added by hand\n\
         10.0.0.2 myapp.local # wsl2-host alias=Ubuntu\n\
         10.0.0.2 ubuntu.wsl # wsl2-host env=Ubuntu\n"
    );
    assert!(dir.path().join("hosts.backup").exists());

    // Reopening sees exactly what was written
    let reopened = HostsFileStore::open(&path, "wsl2-host").await.unwrap();
    let entries = reopened.current_entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["myapp.local"].tag, EntryTag::alias("Ubuntu"));

    // A converged pass leaves the file alone
    let report = reconciler.run_pass().await.unwrap();
    assert!(!report.committed);
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), written);
}
