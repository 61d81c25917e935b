// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Main engine for driving update workflows
//!
//! The engine owns the scheduler and the WAL handle. Every stage change
//! goes through [`Workflow::transition`]; the engine records the new
//! stage in the WAL before executing the effects the transition asked
//! for. On startup [`Engine::recover`] resumes whatever the WAL says was
//! in flight.

use super::recovery::{plan_resume, ResumeAction};
use super::scheduler::{ScheduledKind, Scheduler};
use crate::adapters::{Adapters, ProfileStore, StoreError, SyncAdapter, SyncError};
use crate::clock::Clock;
use crate::id::WorkflowId;
use crate::profile::{ProfileRecord, ProfileSeed, ProfileUpdate};
use crate::storage::wal::WalStoreError;
use crate::storage::SharedWal;
use crate::workflow::{Effect, RetryPolicy, Stage, Workflow, WorkflowEvent};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Interval between retention sweeps
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] WalStoreError),
    #[error("profile store error: {0}")]
    Profile(#[from] StoreError),
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Mandatory delay between persist and sync
    pub sync_delay: Duration,
    /// Retry policy for transient sync failures
    pub retry: RetryPolicy,
    /// How long terminal workflows are kept before pruning
    pub retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_delay: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            retention: Duration::from_secs(24 * 3600),
        }
    }
}

/// A sync attempt ready to execute off the engine task
///
/// The `Syncing` stage is recorded durably before the request is
/// queued; the outcome comes back through [`Engine::complete_sync`].
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub workflow_id: WorkflowId,
    pub attempt: u32,
    pub subject_id: String,
    pub record: ProfileRecord,
}

/// The engine drives workflow state machines and executes effects
///
/// Sync attempts are not run here: the engine queues them as
/// [`SyncRequest`]s for the caller to execute on their own tasks, so a
/// slow sync target never stalls command handling or timers.
pub struct Engine<A: Adapters, C: Clock> {
    adapters: A,
    wal: SharedWal,
    clock: C,
    config: EngineConfig,
    scheduler: Scheduler,
    sync_outbox: Vec<SyncRequest>,
}

impl<A: Adapters, C: Clock> Engine<A, C> {
    pub fn new(adapters: A, wal: SharedWal, clock: C, config: EngineConfig) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_repeating(
            "maintenance",
            clock.now() + MAINTENANCE_INTERVAL,
            MAINTENANCE_INTERVAL,
            ScheduledKind::Maintenance,
        );

        Self {
            adapters,
            wal,
            clock,
            config,
            scheduler,
            sync_outbox: Vec::new(),
        }
    }

    /// Get a reference to the clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Get a workflow by id
    pub fn workflow(&self, id: &WorkflowId) -> Option<Workflow> {
        self.lock_wal().workflow(id).cloned()
    }

    /// Get or create the profile for a subject
    pub async fn get_or_create_profile(
        &self,
        subject_id: &str,
        seed: &ProfileSeed,
    ) -> Result<ProfileRecord, EngineError> {
        Ok(self.adapters.profiles().get_or_create(subject_id, seed).await?)
    }

    /// Submit a profile update
    ///
    /// Creates the workflow, validates sync configuration, and runs the
    /// persist step. The delay and sync steps run later off the
    /// scheduler. Returns the workflow id.
    pub async fn submit(
        &mut self,
        subject_id: &str,
        seed: &ProfileSeed,
        update: ProfileUpdate,
    ) -> Result<WorkflowId, EngineError> {
        // A second submission within the same microsecond must not
        // collide with the first workflow's id.
        let mut micros = self.clock.epoch_micros();
        let id = loop {
            let candidate = WorkflowId::derive(subject_id, micros);
            if self.lock_wal().workflow(&candidate).is_none() {
                break candidate;
            }
            micros += 1;
        };
        let workflow = Workflow::new(id.clone(), subject_id, update, &self.clock);
        self.lock_wal().save_workflow(&workflow)?;

        tracing::info!(workflow = %id, subject_id, "update submitted");

        // Fail fast when the sync target is not configured, before the
        // delay is armed and before wasting a persist.
        if let Err(e) = self.adapters.sync().check_config() {
            self.apply_event(&id, WorkflowEvent::ConfigInvalid {
                reason: e.to_string(),
            })
            .await?;
            return Ok(id);
        }

        self.run_persist(&id, seed).await?;
        Ok(id)
    }

    /// Resume all non-terminal workflows after a restart
    ///
    /// Returns the number of workflows resumed.
    pub async fn recover(&mut self) -> Result<usize, EngineError> {
        let workflows: Vec<Workflow> = {
            let wal = self.lock_wal();
            wal.list_workflows()
                .iter()
                .filter_map(|id| wal.workflow(id).cloned())
                .collect()
        };

        let mut resumed = 0;
        for workflow in workflows {
            let Some(action) = plan_resume(&workflow) else {
                continue;
            };
            resumed += 1;
            tracing::info!(workflow = %workflow.id, stage = workflow.stage.name(), ?action, "resuming workflow");

            match action {
                ResumeAction::RunPersist => {
                    self.run_persist(&workflow.id, &ProfileSeed::default()).await?;
                }
                ResumeAction::StartDelay => {
                    self.arm_delay(&workflow.id).await?;
                }
                ResumeAction::ArmTimer { fire_at_micros } => {
                    self.arm_timer_at(&workflow.id, fire_at_micros);
                }
                ResumeAction::RunSync { attempt } => {
                    if let Some(event) = self
                        .enqueue_sync(&workflow.id, &workflow.subject_id, attempt)
                        .await
                    {
                        self.apply_event(&workflow.id, event).await?;
                    }
                }
            }
        }

        Ok(resumed)
    }

    /// Fire all timers due at the current time
    pub async fn tick(&mut self) -> Result<(), EngineError> {
        let ready = self.scheduler.poll(self.clock.now());
        for item in ready {
            match item.kind {
                ScheduledKind::DelayElapsed { workflow_id }
                | ScheduledKind::SyncRetry { workflow_id } => {
                    self.apply_event(&workflow_id, WorkflowEvent::TimerFired).await?;
                }
                ScheduledKind::Maintenance => {
                    let now = self.clock.epoch_micros();
                    let retention = self.config.retention;
                    if let Err(e) = self.lock_wal().prune_terminal(now, retention) {
                        tracing::warn!(?e, "retention sweep failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Next scheduled fire time, for the run loop's sleep
    pub fn next_fire_time(&self) -> Option<Instant> {
        self.scheduler.next_fire_time()
    }

    /// Run the persist step and feed the outcome back in
    async fn run_persist(&mut self, id: &WorkflowId, seed: &ProfileSeed) -> Result<(), EngineError> {
        let workflow = self
            .workflow(id)
            .ok_or_else(|| EngineError::WorkflowNotFound(id.clone()))?;

        let profiles = self.adapters.profiles();
        let mut result = profiles
            .apply_update(&workflow.subject_id, &workflow.update)
            .await;

        // First write for this subject: create the record, then merge
        if let Err(StoreError::NotFound(_)) = result {
            result = match profiles.get_or_create(&workflow.subject_id, seed).await {
                Ok(_) => {
                    profiles
                        .apply_update(&workflow.subject_id, &workflow.update)
                        .await
                }
                Err(e) => Err(e),
            };
        }

        let event = match result {
            Ok(_) => WorkflowEvent::PersistOk,
            Err(e) => {
                tracing::error!(workflow = %id, error = %e, "persist step failed");
                WorkflowEvent::PersistFailed {
                    reason: e.to_string(),
                }
            }
        };
        self.apply_event(id, event).await
    }

    /// Arm the pre-sync delay for a persisted workflow
    async fn arm_delay(&mut self, id: &WorkflowId) -> Result<(), EngineError> {
        let fire_at_micros =
            self.clock.epoch_micros() + self.config.sync_delay.as_micros() as u64;
        self.arm_timer_at(id, fire_at_micros);
        self.apply_event(id, WorkflowEvent::DelayArmed { fire_at_micros })
            .await
    }

    /// Schedule the in-memory timer for a wall-clock deadline
    ///
    /// Deadlines already in the past fire on the next tick.
    fn arm_timer_at(&mut self, id: &WorkflowId, fire_at_micros: u64) {
        let remaining = Duration::from_micros(
            fire_at_micros.saturating_sub(self.clock.epoch_micros()),
        );
        self.scheduler.schedule(
            format!("delay-{}", id),
            self.clock.now() + remaining,
            ScheduledKind::DelayElapsed {
                workflow_id: id.clone(),
            },
        );
    }

    /// Load the current record and queue a sync attempt for the driver
    ///
    /// Returns a failure event instead when the record cannot be read.
    async fn enqueue_sync(
        &mut self,
        id: &WorkflowId,
        subject_id: &str,
        attempt: u32,
    ) -> Option<WorkflowEvent> {
        let record = match self
            .adapters
            .profiles()
            .get_or_create(subject_id, &ProfileSeed::default())
            .await
        {
            Ok(record) => record,
            Err(e) => {
                return Some(WorkflowEvent::SyncFailed {
                    reason: format!("loading record: {}", e),
                    transient: true,
                })
            }
        };

        tracing::info!(workflow = %id, attempt, "sync attempt queued");
        self.sync_outbox.push(SyncRequest {
            workflow_id: id.clone(),
            attempt,
            subject_id: subject_id.to_string(),
            record,
        });
        None
    }

    /// Drain the sync attempts queued since the last call
    ///
    /// The caller runs each one off this task and feeds the result back
    /// through [`Engine::complete_sync`].
    pub fn take_sync_work(&mut self) -> Vec<SyncRequest> {
        std::mem::take(&mut self.sync_outbox)
    }

    /// A handle to the sync adapter for executing queued attempts
    pub fn sync_adapter(&self) -> A::Sync {
        self.adapters.sync()
    }

    /// Feed the outcome of a dispatched sync attempt back in
    ///
    /// Outcomes for an attempt the workflow has already moved past are
    /// dropped.
    pub async fn complete_sync(
        &mut self,
        id: &WorkflowId,
        attempt: u32,
        outcome: Result<(), SyncError>,
    ) -> Result<(), EngineError> {
        let Some(workflow) = self.workflow(id) else {
            // Pruned while the attempt was in flight
            return Ok(());
        };
        if workflow.stage != (Stage::Syncing { attempt }) {
            tracing::debug!(
                workflow = %id,
                attempt,
                stage = workflow.stage.name(),
                "dropping stale sync outcome"
            );
            return Ok(());
        }

        let event = match outcome {
            Ok(()) => WorkflowEvent::SyncOk,
            Err(e) => {
                tracing::warn!(workflow = %id, attempt, error = %e, "sync attempt failed");
                WorkflowEvent::SyncFailed {
                    transient: e.is_transient(),
                    reason: e.to_string(),
                }
            }
        };
        self.apply_event(id, event).await
    }

    /// Apply an event to a workflow, record the transition, execute effects
    ///
    /// Effects can produce follow-up events (a completed sync call, an
    /// armed delay), which are processed in the same pass.
    async fn apply_event(&mut self, id: &WorkflowId, event: WorkflowEvent) -> Result<(), EngineError> {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let workflow = self
                .workflow(id)
                .ok_or_else(|| EngineError::WorkflowNotFound(id.clone()))?;

            let (next, effects) = workflow.transition(&event, &self.config.retry, &self.clock);
            self.lock_wal().save_workflow(&next)?;

            if next.stage != workflow.stage {
                tracing::debug!(
                    workflow = %id,
                    from = workflow.stage.name(),
                    to = next.stage.name(),
                    "stage transition"
                );
            }

            for effect in effects {
                match effect {
                    Effect::StartDelay => {
                        let fire_at_micros = self.clock.epoch_micros()
                            + self.config.sync_delay.as_micros() as u64;
                        self.arm_timer_at(id, fire_at_micros);
                        pending.push_back(WorkflowEvent::DelayArmed { fire_at_micros });
                    }
                    Effect::SyncProfile { attempt } => {
                        if let Some(event) =
                            self.enqueue_sync(id, &next.subject_id, attempt).await
                        {
                            pending.push_back(event);
                        }
                    }
                    Effect::RetrySync { attempt, after } => {
                        tracing::info!(workflow = %id, attempt, backoff = ?after, "retry scheduled");
                        self.scheduler.schedule(
                            format!("retry-{}-{}", id, attempt),
                            self.clock.now() + after,
                            ScheduledKind::SyncRetry {
                                workflow_id: id.clone(),
                            },
                        );
                    }
                }
            }
        }

        Ok(())
    }

    fn lock_wal(&self) -> std::sync::MutexGuard<'_, crate::storage::wal::WalStore> {
        self.wal.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
