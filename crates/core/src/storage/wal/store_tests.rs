// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};
use crate::profile::{ProfileRecord, ProfileSeed};
use crate::workflow::{RetryPolicy, Stage, WorkflowEvent};
use tempfile::TempDir;

fn temp_store_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().to_path_buf();
    (dir, path)
}

fn seed() -> ProfileSeed {
    ProfileSeed {
        email: Some("otto@example.com".to_string()),
        first_name: None,
        last_name: None,
    }
}

fn sample_workflow(clock: &FakeClock) -> Workflow {
    Workflow::new(
        WorkflowId::derive("auth0|u1", clock.epoch_micros()),
        "auth0|u1",
        ProfileUpdate {
            city: Some("Lisbon".to_string()),
            ..ProfileUpdate::default()
        },
        clock,
    )
}

#[test]
fn store_creates_directory() {
    let (_dir, path) = temp_store_dir();
    let subdir = path.join("nested");

    let _store = WalStore::open(&subdir).unwrap();

    assert!(subdir.exists());
    assert!(subdir.join("wal.jsonl").exists());
}

#[test]
fn store_create_and_read_profile() {
    let (_dir, path) = temp_store_dir();
    let mut store = WalStore::open(&path).unwrap();

    let record = ProfileRecord::new("auth0|u1", &seed(), 100);
    store.create_profile(&record).unwrap();

    let loaded = store.profile("auth0|u1").unwrap();
    assert_eq!(loaded.email, "otto@example.com");
    assert_eq!(loaded.created_at_micros, 100);
}

#[test]
fn store_merge_profile_returns_merged_record() {
    let (_dir, path) = temp_store_dir();
    let mut store = WalStore::open(&path).unwrap();
    store
        .create_profile(&ProfileRecord::new("auth0|u1", &seed(), 100))
        .unwrap();

    let update = ProfileUpdate {
        pincode: Some("560001".to_string()),
        ..ProfileUpdate::default()
    };
    let merged = store.merge_profile("auth0|u1", &update, 200).unwrap();
    assert_eq!(merged.pincode, "560001");
    assert_eq!(merged.updated_at_micros, 200);
}

#[test]
fn store_merge_missing_profile_is_not_found() {
    let (_dir, path) = temp_store_dir();
    let mut store = WalStore::open(&path).unwrap();

    let err = store
        .merge_profile("auth0|missing", &ProfileUpdate::default(), 200)
        .unwrap_err();
    assert!(matches!(err, WalStoreError::NotFound { .. }));
}

#[test]
fn store_save_workflow_creates_then_transitions() {
    let (_dir, path) = temp_store_dir();
    let mut store = WalStore::open(&path).unwrap();
    let clock = FakeClock::new();
    let retry = RetryPolicy::default();

    let workflow = sample_workflow(&clock);
    store.save_workflow(&workflow).unwrap();
    assert_eq!(store.workflow(&workflow.id).unwrap().stage, Stage::Started);

    let (workflow, _) = workflow.transition(&WorkflowEvent::PersistOk, &retry, &clock);
    store.save_workflow(&workflow).unwrap();
    assert_eq!(
        store.workflow(&workflow.id).unwrap().stage,
        Stage::Persisted
    );
}

#[test]
fn store_state_survives_reopen() {
    let (_dir, path) = temp_store_dir();
    let clock = FakeClock::new();
    let retry = RetryPolicy::default();
    let workflow = sample_workflow(&clock);

    {
        let mut store = WalStore::open(&path).unwrap();
        store
            .create_profile(&ProfileRecord::new("auth0|u1", &seed(), 100))
            .unwrap();
        store.save_workflow(&workflow).unwrap();
        let (workflow, _) = workflow.transition(&WorkflowEvent::PersistOk, &retry, &clock);
        store.save_workflow(&workflow).unwrap();
        let (workflow, _) = workflow.transition(
            &WorkflowEvent::DelayArmed {
                fire_at_micros: clock.epoch_micros() + 10_000_000,
            },
            &retry,
            &clock,
        );
        store.save_workflow(&workflow).unwrap();
    }

    let store = WalStore::open(&path).unwrap();
    assert!(store.profile("auth0|u1").is_some());

    let recovered = store.workflow(&workflow.id).unwrap();
    assert!(matches!(recovered.stage, Stage::Waiting { .. }));
    assert_eq!(recovered.update.city.as_deref(), Some("Lisbon"));
}

#[test]
fn store_replay_stops_at_corrupt_tail() {
    let (_dir, path) = temp_store_dir();

    {
        let mut store = WalStore::open(&path).unwrap();
        store
            .create_profile(&ProfileRecord::new("auth0|u1", &seed(), 100))
            .unwrap();
    }

    use std::io::Write;
    let wal_path = path.join("wal.jsonl");
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&wal_path)
        .unwrap();
    file.write_all(b"{\"sequence\":1,\"trunc").unwrap();
    drop(file);

    // Valid prefix still replays
    let store = WalStore::open(&path).unwrap();
    assert!(store.profile("auth0|u1").is_some());
}

#[test]
fn repair_wal_truncates_corrupt_tail() {
    let (_dir, path) = temp_store_dir();

    {
        let mut store = WalStore::open(&path).unwrap();
        store
            .create_profile(&ProfileRecord::new("auth0|u1", &seed(), 100))
            .unwrap();
    }

    let wal_path = path.join("wal.jsonl");
    let clean_size = std::fs::metadata(&wal_path).unwrap().len();

    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&wal_path)
        .unwrap();
    file.write_all(b"garbage").unwrap();
    drop(file);

    let removed = WalStore::repair_wal(&path).unwrap();
    assert_eq!(removed, 7);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), clean_size);

    // Clean file is a no-op
    assert_eq!(WalStore::repair_wal(&path).unwrap(), 0);
}

#[test]
fn prune_removes_old_terminal_workflows() {
    let (_dir, path) = temp_store_dir();
    let mut store = WalStore::open(&path).unwrap();
    let clock = FakeClock::new();
    let retry = RetryPolicy::default();

    // One completed workflow, one still waiting
    let done = sample_workflow(&clock);
    store.save_workflow(&done).unwrap();
    let (done, _) = done.transition(&WorkflowEvent::PersistOk, &retry, &clock);
    store.save_workflow(&done).unwrap();
    let (done, _) = done.transition(
        &WorkflowEvent::DelayArmed {
            fire_at_micros: clock.epoch_micros(),
        },
        &retry,
        &clock,
    );
    store.save_workflow(&done).unwrap();
    let (done, _) = done.transition(&WorkflowEvent::TimerFired, &retry, &clock);
    store.save_workflow(&done).unwrap();
    let (done, _) = done.transition(&WorkflowEvent::SyncOk, &retry, &clock);
    store.save_workflow(&done).unwrap();

    clock.advance(std::time::Duration::from_secs(1));
    let waiting = sample_workflow(&clock);
    store.save_workflow(&waiting).unwrap();

    store
        .create_profile(&ProfileRecord::new("auth0|u1", &seed(), 100))
        .unwrap();

    // Half the retention window elapsed: nothing to prune yet
    let retention = std::time::Duration::from_secs(3600);
    let half_later = clock.epoch_micros() + retention.as_micros() as u64 / 2;
    let result = store.prune_terminal(half_later, retention).unwrap();
    assert_eq!(result.workflows_removed, 0);

    let much_later = clock.epoch_micros() + 2 * retention.as_micros() as u64;
    let result = store.prune_terminal(much_later, retention).unwrap();
    assert_eq!(result.workflows_removed, 1);
    assert_eq!(result.entries_removed, 5);
    assert!(result.bytes_reclaimed > 0);

    assert!(store.workflow(&done.id).is_none());
    assert!(store.workflow(&waiting.id).is_some());
    assert!(store.profile("auth0|u1").is_some());

    // Pruned state survives reopen
    drop(store);
    let store = WalStore::open(&path).unwrap();
    assert!(store.workflow(&done.id).is_none());
    assert!(store.workflow(&waiting.id).is_some());
    assert!(store.profile("auth0|u1").is_some());
}
