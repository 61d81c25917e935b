// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{AdapterCall, FakeAdapters};
use crate::clock::FakeClock;
use crate::storage::wal::WalStore;
use crate::workflow::Stage;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn open_engine(
    dir: &TempDir,
    fakes: &FakeAdapters,
    clock: &FakeClock,
) -> Engine<FakeAdapters, FakeClock> {
    let wal = WalStore::open(dir.path()).unwrap();
    Engine::new(
        fakes.clone(),
        Arc::new(Mutex::new(wal)),
        clock.clone(),
        EngineConfig::default(),
    )
}

fn seed() -> ProfileSeed {
    ProfileSeed {
        email: Some("otto@example.com".to_string()),
        first_name: None,
        last_name: None,
    }
}

fn update() -> ProfileUpdate {
    ProfileUpdate {
        city: Some("Lisbon".to_string()),
        ..ProfileUpdate::default()
    }
}

/// Execute queued sync attempts inline and feed the outcomes back,
/// standing in for the driver task.
async fn drive(engine: &mut Engine<FakeAdapters, FakeClock>, fakes: &FakeAdapters) {
    loop {
        let work = engine.take_sync_work();
        if work.is_empty() {
            break;
        }
        for request in work {
            let outcome = fakes.sync().sync(&request.subject_id, &request.record).await;
            engine
                .complete_sync(&request.workflow_id, request.attempt, outcome)
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn happy_path_persists_waits_then_syncs() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();

    // Persisted immediately, then waiting out the delay
    let workflow = engine.workflow(&id).unwrap();
    assert!(matches!(workflow.stage, Stage::Waiting { .. }));
    assert_eq!(fakes.profile("auth0|u1").unwrap().city, "Lisbon");
    assert_eq!(fakes.sync_calls(), 0);

    // One second short of the delay: nothing fires
    clock.advance(Duration::from_secs(9));
    engine.tick().await.unwrap();
    assert!(engine.take_sync_work().is_empty());
    assert!(matches!(
        engine.workflow(&id).unwrap().stage,
        Stage::Waiting { .. }
    ));

    clock.advance(Duration::from_secs(1));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    assert_eq!(fakes.sync_calls(), 1);
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Completed);
}

#[tokio::test]
async fn persist_always_precedes_sync() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    engine.submit("auth0|u1", &seed(), update()).await.unwrap();
    clock.advance(Duration::from_secs(10));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;

    let calls = fakes.calls();
    let first_persist = calls
        .iter()
        .position(|c| matches!(c, AdapterCall::ApplyUpdate { .. }))
        .unwrap();
    let first_sync = calls
        .iter()
        .position(|c| matches!(c, AdapterCall::Sync { .. }))
        .unwrap();
    assert!(first_persist < first_sync);
}

#[tokio::test]
async fn transient_failures_retry_with_backoff() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    fakes.push_sync_transient("503 unavailable");
    fakes.push_sync_transient("timeout");
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();

    clock.advance(Duration::from_secs(10));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    assert_eq!(fakes.sync_calls(), 1);
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Syncing { attempt: 1 });

    // First backoff: 1s
    clock.advance(Duration::from_secs(1));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    assert_eq!(fakes.sync_calls(), 2);

    // Second backoff: 2s
    clock.advance(Duration::from_secs(2));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    assert_eq!(fakes.sync_calls(), 3);
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Completed);
}

#[tokio::test]
async fn exhausted_retries_fail_the_workflow() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    fakes.fail_sync_forever("unreachable");
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();

    clock.advance(Duration::from_secs(10));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    clock.advance(Duration::from_secs(1));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    clock.advance(Duration::from_secs(2));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;

    // Exactly max_attempts calls, then terminal failure
    assert_eq!(fakes.sync_calls(), 3);
    let workflow = engine.workflow(&id).unwrap();
    assert!(matches!(workflow.stage, Stage::Failed { .. }));
    assert_eq!(workflow.error(), Some("transient sync failure: unreachable"));

    // Further ticks change nothing
    clock.advance(Duration::from_secs(60));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    assert_eq!(fakes.sync_calls(), 3);
}

#[tokio::test]
async fn fatal_sync_error_fails_without_retry() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    fakes.push_sync_fatal("422 rejected");
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();
    clock.advance(Duration::from_secs(10));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;

    assert_eq!(fakes.sync_calls(), 1);
    assert!(matches!(
        engine.workflow(&id).unwrap().stage,
        Stage::Failed { .. }
    ));
}

#[tokio::test]
async fn persist_failure_fails_before_any_sync() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    fakes.fail_persist("disk full");
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();

    let workflow = engine.workflow(&id).unwrap();
    assert!(matches!(workflow.stage, Stage::Failed { .. }));

    clock.advance(Duration::from_secs(60));
    engine.tick().await.unwrap();
    assert!(engine.take_sync_work().is_empty());
    assert_eq!(fakes.sync_calls(), 0);
}

#[tokio::test]
async fn missing_sync_config_fails_before_persist() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    fakes.fail_config("sync url not set");
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();

    let workflow = engine.workflow(&id).unwrap();
    assert!(matches!(workflow.stage, Stage::Failed { .. }));
    assert!(fakes.calls().is_empty());
}

#[tokio::test]
async fn restart_during_delay_rearms_remaining_time() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    let clock = FakeClock::new();

    let id = {
        let mut engine = open_engine(&dir, &fakes, &clock);
        engine.submit("auth0|u1", &seed(), update()).await.unwrap()
    };

    // Four seconds into the delay the process dies
    clock.advance(Duration::from_secs(4));

    let mut engine = open_engine(&dir, &fakes, &clock);
    let resumed = engine.recover().await.unwrap();
    assert_eq!(resumed, 1);

    // Remaining delay is honored, not restarted from scratch
    clock.advance(Duration::from_secs(5));
    engine.tick().await.unwrap();
    assert!(engine.take_sync_work().is_empty());
    assert_eq!(fakes.sync_calls(), 0);

    clock.advance(Duration::from_secs(1));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;
    assert_eq!(fakes.sync_calls(), 1);
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Completed);
}

#[tokio::test]
async fn restart_after_deadline_fires_immediately() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    let clock = FakeClock::new();

    let id = {
        let mut engine = open_engine(&dir, &fakes, &clock);
        engine.submit("auth0|u1", &seed(), update()).await.unwrap()
    };

    // Process comes back long after the deadline passed
    clock.advance(Duration::from_secs(3600));

    let mut engine = open_engine(&dir, &fakes, &clock);
    engine.recover().await.unwrap();
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;

    assert_eq!(fakes.sync_calls(), 1);
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Completed);
}

#[tokio::test]
async fn restart_mid_sync_reissues_current_attempt() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    fakes.push_sync_transient("timeout");
    let clock = FakeClock::new();

    let id = {
        let mut engine = open_engine(&dir, &fakes, &clock);
        let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();
        clock.advance(Duration::from_secs(10));
        engine.tick().await.unwrap();
        drive(&mut engine, &fakes).await;
        // Attempt 1 failed transiently; crash during the backoff
        assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Syncing { attempt: 1 });
        id
    };

    let mut engine = open_engine(&dir, &fakes, &clock);
    let resumed = engine.recover().await.unwrap();
    assert_eq!(resumed, 1);
    drive(&mut engine, &fakes).await;

    // The in-flight attempt was reissued and succeeded
    assert_eq!(fakes.sync_calls(), 2);
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Completed);
}

#[tokio::test]
async fn stale_sync_outcome_is_dropped() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    let id = engine.submit("auth0|u1", &seed(), update()).await.unwrap();
    clock.advance(Duration::from_secs(10));
    engine.tick().await.unwrap();
    let work = engine.take_sync_work();
    assert_eq!(work.len(), 1);

    // The real attempt succeeds first
    engine.complete_sync(&id, work[0].attempt, Ok(())).await.unwrap();
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Completed);

    // A late duplicate outcome for the same attempt changes nothing
    engine
        .complete_sync(&id, work[0].attempt, Err(SyncError::Transient("late".to_string())))
        .await
        .unwrap();
    assert_eq!(engine.workflow(&id).unwrap().stage, Stage::Completed);
}

#[tokio::test]
async fn terminal_workflows_are_not_resumed() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    let clock = FakeClock::new();

    {
        let mut engine = open_engine(&dir, &fakes, &clock);
        engine.submit("auth0|u1", &seed(), update()).await.unwrap();
        clock.advance(Duration::from_secs(10));
        engine.tick().await.unwrap();
        drive(&mut engine, &fakes).await;
    }
    assert_eq!(fakes.sync_calls(), 1);

    let mut engine = open_engine(&dir, &fakes, &clock);
    let resumed = engine.recover().await.unwrap();
    assert_eq!(resumed, 0);
    assert_eq!(fakes.sync_calls(), 1);
}

#[tokio::test]
async fn same_instant_submissions_get_distinct_workflows() {
    let dir = TempDir::new().unwrap();
    let fakes = FakeAdapters::new();
    let clock = FakeClock::new();
    let mut engine = open_engine(&dir, &fakes, &clock);

    // No clock movement between the two submits: the ids must still
    // differ, and neither payload may be lost.
    let first = engine.submit("auth0|u1", &seed(), update()).await.unwrap();
    let second = engine
        .submit(
            "auth0|u1",
            &seed(),
            ProfileUpdate {
                pincode: Some("560001".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(first, second);

    clock.advance(Duration::from_secs(10));
    engine.tick().await.unwrap();
    drive(&mut engine, &fakes).await;

    assert_eq!(engine.workflow(&first).unwrap().stage, Stage::Completed);
    assert_eq!(engine.workflow(&second).unwrap().stage, Stage::Completed);

    // Both updates landed on the one record
    let record = fakes.profile("auth0|u1").unwrap();
    assert_eq!(record.city, "Lisbon");
    assert_eq!(record.pincode, "560001");
}
