// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine task and the handle routes use to reach it
//!
//! The engine owns the WAL and the timer scheduler, so it runs in a
//! single dedicated task. Routes send commands over an mpsc channel and
//! await oneshot replies; an in-flight delay never blocks a request.

use pp_core::{
    Adapters, Clock, Engine, EngineError, IdentityClaim, ProfileRecord, ProfileUpdate, SyncAdapter,
    SyncError, Workflow, WorkflowId,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("engine task unavailable")]
    Closed,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Commands the engine task accepts
pub enum Command {
    GetProfile {
        claim: IdentityClaim,
        reply: oneshot::Sender<Result<ProfileRecord, EngineError>>,
    },
    Submit {
        claim: IdentityClaim,
        update: ProfileUpdate,
        reply: oneshot::Sender<Result<WorkflowId, EngineError>>,
    },
    WorkflowStatus {
        id: WorkflowId,
        reply: oneshot::Sender<Option<Workflow>>,
    },
}

/// Cloneable handle to the engine task
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Create a handle and the receiver to hand to [`run_engine`]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn profile(&self, claim: IdentityClaim) -> Result<ProfileRecord, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::GetProfile { claim, reply })
            .await
            .map_err(|_| HandleError::Closed)?;
        Ok(rx.await.map_err(|_| HandleError::Closed)??)
    }

    pub async fn submit(
        &self,
        claim: IdentityClaim,
        update: ProfileUpdate,
    ) -> Result<WorkflowId, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Submit {
                claim,
                update,
                reply,
            })
            .await
            .map_err(|_| HandleError::Closed)?;
        Ok(rx.await.map_err(|_| HandleError::Closed)??)
    }

    pub async fn status(&self, id: WorkflowId) -> Result<Option<Workflow>, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::WorkflowStatus { id, reply })
            .await
            .map_err(|_| HandleError::Closed)?;
        rx.await.map_err(|_| HandleError::Closed)
    }
}

type SyncOutcome = (WorkflowId, u32, Result<(), SyncError>);

/// Run the engine task until every handle is dropped
///
/// Resumes interrupted workflows first, then alternates between serving
/// commands, firing due timers, and absorbing sync outcomes. Sync
/// attempts themselves run on their own tasks, so a slow sync target
/// never delays a command reply.
pub async fn run_engine<A: Adapters, C: Clock>(
    mut engine: Engine<A, C>,
    mut rx: mpsc::Receiver<Command>,
) {
    let sync = engine.sync_adapter();
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<SyncOutcome>(32);

    match engine.recover().await {
        Ok(0) => {}
        Ok(resumed) => tracing::info!(resumed, "resumed workflows after restart"),
        Err(e) => tracing::error!(error = %e, "workflow recovery failed"),
    }

    loop {
        dispatch_sync_work(&mut engine, &sync, &outcome_tx);

        let tick_at = engine.next_fire_time();
        tokio::select! {
            cmd = rx.recv() => {
                let Some(cmd) = cmd else { break };
                dispatch(&mut engine, cmd).await;
            }
            Some((id, attempt, outcome)) = outcome_rx.recv() => {
                if let Err(e) = engine.complete_sync(&id, attempt, outcome).await {
                    tracing::error!(workflow = %id, error = %e, "applying sync outcome failed");
                }
            }
            () = sleep_until(tick_at) => {
                if let Err(e) = engine.tick().await {
                    tracing::error!(error = %e, "engine tick failed");
                }
            }
        }
    }

    tracing::info!("engine task stopped");
}

/// Hand each queued sync attempt to its own task
fn dispatch_sync_work<A: Adapters, C: Clock>(
    engine: &mut Engine<A, C>,
    sync: &A::Sync,
    outcomes: &mpsc::Sender<SyncOutcome>,
) {
    for request in engine.take_sync_work() {
        let sync = sync.clone();
        let outcomes = outcomes.clone();
        tokio::spawn(async move {
            let outcome = sync.sync(&request.subject_id, &request.record).await;
            let _ = outcomes
                .send((request.workflow_id, request.attempt, outcome))
                .await;
        });
    }
}

async fn dispatch<A: Adapters, C: Clock>(engine: &mut Engine<A, C>, cmd: Command) {
    match cmd {
        Command::GetProfile { claim, reply } => {
            let result = engine
                .get_or_create_profile(&claim.subject, &claim.seed())
                .await;
            let _ = reply.send(result);
        }
        Command::Submit {
            claim,
            update,
            reply,
        } => {
            let seed = claim.seed();
            let result = engine.submit(&claim.subject, &seed, update).await;
            let _ = reply.send(result);
        }
        Command::WorkflowStatus { id, reply } => {
            let _ = reply.send(engine.workflow(&id));
        }
    }
}

async fn sleep_until(at: Option<std::time::Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
