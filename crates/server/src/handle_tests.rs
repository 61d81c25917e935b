// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use pp_core::adapters::FakeProfileStore;
use pp_core::{EngineConfig, FakeAdapters, Stage, SystemClock, WalStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn claim(subject: &str) -> IdentityClaim {
    IdentityClaim {
        subject: subject.to_string(),
        email: Some("ana@example.com".to_string()),
        given_name: Some("Ana".to_string()),
        family_name: Some("Costa".to_string()),
        expires_at: u64::MAX,
    }
}

fn spawn_engine(fakes: FakeAdapters) -> EngineHandle {
    let wal = Arc::new(Mutex::new(WalStore::open_temp().unwrap()));
    let config = EngineConfig {
        sync_delay: Duration::from_millis(50),
        ..Default::default()
    };
    let engine = Engine::new(fakes, wal, SystemClock, config);
    let (handle, rx) = EngineHandle::channel(16);
    tokio::spawn(run_engine(engine, rx));
    handle
}

async fn wait_terminal(handle: &EngineHandle, id: &WorkflowId) -> Workflow {
    for _ in 0..100 {
        if let Some(workflow) = handle.status(id.clone()).await.unwrap() {
            if workflow.stage.is_terminal() {
                return workflow;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("workflow {id} did not reach a terminal stage");
}

#[tokio::test]
async fn profile_command_creates_from_claim_seed() {
    let handle = spawn_engine(FakeAdapters::new());

    let record = handle.profile(claim("auth0|u1")).await.unwrap();

    assert_eq!(record.subject_id, "auth0|u1");
    assert_eq!(record.email, "ana@example.com");
    assert_eq!(record.first_name, "Ana");
}

#[tokio::test]
async fn submitted_update_runs_to_completion() {
    let fakes = FakeAdapters::new();
    let handle = spawn_engine(fakes.clone());

    let update = ProfileUpdate {
        city: Some("Lisbon".to_string()),
        ..Default::default()
    };
    let id = handle.submit(claim("auth0|u1"), update).await.unwrap();

    let done = wait_terminal(&handle, &id).await;
    assert!(matches!(done.stage, Stage::Completed));
    assert_eq!(fakes.sync_calls(), 1);
    assert_eq!(fakes.profile("auth0|u1").unwrap().city, "Lisbon");
}

#[tokio::test]
async fn transient_failures_retry_in_the_background() {
    let fakes = FakeAdapters::new();
    fakes.push_sync_transient("target busy");
    let handle = spawn_engine(fakes.clone());

    let id = handle
        .submit(claim("auth0|u1"), ProfileUpdate::default())
        .await
        .unwrap();

    let done = wait_terminal(&handle, &id).await;
    assert!(matches!(done.stage, Stage::Completed));
    assert_eq!(fakes.sync_calls(), 2);
}

/// Sync adapter that signals when an attempt starts, then holds it open
#[derive(Clone)]
struct SlowSync {
    started: Arc<Notify>,
    hold: Duration,
}

#[async_trait]
impl SyncAdapter for SlowSync {
    fn check_config(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn sync(&self, _subject_id: &str, _record: &ProfileRecord) -> Result<(), SyncError> {
        self.started.notify_one();
        tokio::time::sleep(self.hold).await;
        Ok(())
    }
}

#[derive(Clone)]
struct SlowAdapters {
    profiles: FakeProfileStore,
    sync: SlowSync,
}

impl Adapters for SlowAdapters {
    type Profiles = FakeProfileStore;
    type Sync = SlowSync;

    fn profiles(&self) -> FakeProfileStore {
        self.profiles.clone()
    }

    fn sync(&self) -> SlowSync {
        self.sync.clone()
    }
}

#[tokio::test]
async fn commands_are_served_while_a_sync_attempt_hangs() {
    let fakes = FakeAdapters::new();
    let started = Arc::new(Notify::new());
    let adapters = SlowAdapters {
        profiles: fakes.profiles(),
        sync: SlowSync {
            started: Arc::clone(&started),
            hold: Duration::from_secs(2),
        },
    };

    let wal = Arc::new(Mutex::new(WalStore::open_temp().unwrap()));
    let config = EngineConfig {
        sync_delay: Duration::from_millis(20),
        ..Default::default()
    };
    let engine = Engine::new(adapters, wal, SystemClock, config);
    let (handle, rx) = EngineHandle::channel(16);
    tokio::spawn(run_engine(engine, rx));

    let update = ProfileUpdate {
        city: Some("Porto".to_string()),
        ..Default::default()
    };
    handle.submit(claim("auth0|slow"), update).await.unwrap();
    started.notified().await;

    // The attempt is in flight; an unrelated command must not queue
    // behind it.
    let asked = tokio::time::Instant::now();
    let record = handle.profile(claim("auth0|other")).await.unwrap();
    assert_eq!(record.subject_id, "auth0|other");
    assert!(
        asked.elapsed() < Duration::from_millis(500),
        "profile command waited {:?} behind an in-flight sync",
        asked.elapsed()
    );
}

#[tokio::test]
async fn status_of_unknown_workflow_is_none() {
    let handle = spawn_engine(FakeAdapters::new());

    let status = handle
        .status(WorkflowId("update-auth0|u1-0".to_string()))
        .await
        .unwrap();
    assert!(status.is_none());
}
