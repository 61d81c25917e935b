// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow state machine
//!
//! One instance sequences a single submitted update through
//! persist → wait → sync. The machine is pure: it maps an event to the
//! next stage plus effects; the engine executes effects, records every
//! transition in the WAL, and feeds resulting events back in.

use super::retry::RetryPolicy;
use crate::clock::Clock;
use crate::id::WorkflowId;
use crate::profile::ProfileUpdate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stage of one workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Started,
    Persisted,
    Waiting { fire_at_micros: u64 },
    Syncing { attempt: u32 },
    Completed,
    Failed { cause: FailureCause },
}

/// Terminal failure cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    PersistFailed { reason: String },
    SyncFailed { reason: String },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Started => "started",
            Stage::Persisted => "persisted",
            Stage::Waiting { .. } => "waiting",
            Stage::Syncing { .. } => "syncing",
            Stage::Completed => "completed",
            Stage::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed { .. })
    }
}

/// Events fed to the state machine by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// Sync target configuration is missing; fail before wasting the delay
    ConfigInvalid { reason: String },
    PersistOk,
    PersistFailed { reason: String },
    /// The durable delay timer was armed at the given deadline
    DelayArmed { fire_at_micros: u64 },
    /// The delay or a retry backoff elapsed
    TimerFired,
    SyncOk,
    SyncFailed { reason: String, transient: bool },
}

/// Effects requested by a transition, executed by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Arm the durable pre-sync delay
    StartDelay,
    /// Issue sync attempt N against the external system
    SyncProfile { attempt: u32 },
    /// Schedule sync attempt N after a backoff
    RetrySync { attempt: u32, after: Duration },
}

/// One in-flight or completed update operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub subject_id: String,
    pub update: ProfileUpdate,
    #[serde(flatten)]
    pub stage: Stage,
    pub created_at_micros: u64,
    pub updated_at_micros: u64,
}

impl Workflow {
    pub fn new(
        id: WorkflowId,
        subject_id: impl Into<String>,
        update: ProfileUpdate,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.epoch_micros();
        Self {
            id,
            subject_id: subject_id.into(),
            update,
            stage: Stage::Started,
            created_at_micros: now,
            updated_at_micros: now,
        }
    }

    /// Handle an event and return the new state plus effects
    ///
    /// Events that do not apply to the current stage are ignored; terminal
    /// stages absorb everything.
    pub fn transition(
        &self,
        event: &WorkflowEvent,
        retry: &RetryPolicy,
        clock: &impl Clock,
    ) -> (Workflow, Vec<Effect>) {
        let mut workflow = self.clone();
        let mut effects = Vec::new();

        let next = match (&self.stage, event) {
            (Stage::Started, WorkflowEvent::ConfigInvalid { reason }) => Some(Stage::Failed {
                cause: FailureCause::SyncFailed {
                    reason: reason.clone(),
                },
            }),

            (Stage::Started, WorkflowEvent::PersistOk) => {
                effects.push(Effect::StartDelay);
                Some(Stage::Persisted)
            }

            (Stage::Started, WorkflowEvent::PersistFailed { reason }) => Some(Stage::Failed {
                cause: FailureCause::PersistFailed {
                    reason: reason.clone(),
                },
            }),

            (Stage::Persisted, WorkflowEvent::DelayArmed { fire_at_micros }) => {
                Some(Stage::Waiting {
                    fire_at_micros: *fire_at_micros,
                })
            }

            (Stage::Waiting { .. }, WorkflowEvent::TimerFired) => {
                effects.push(Effect::SyncProfile { attempt: 1 });
                Some(Stage::Syncing { attempt: 1 })
            }

            (Stage::Syncing { .. }, WorkflowEvent::SyncOk) => Some(Stage::Completed),

            (Stage::Syncing { attempt }, WorkflowEvent::SyncFailed { reason, transient }) => {
                match (*transient, retry.backoff_after(*attempt)) {
                    (true, Some(after)) => {
                        effects.push(Effect::RetrySync {
                            attempt: attempt + 1,
                            after,
                        });
                        None
                    }
                    _ => Some(Stage::Failed {
                        cause: FailureCause::SyncFailed {
                            reason: reason.clone(),
                        },
                    }),
                }
            }

            // A retry backoff elapsed: issue the next attempt
            (Stage::Syncing { attempt }, WorkflowEvent::TimerFired) => {
                let next_attempt = attempt + 1;
                effects.push(Effect::SyncProfile {
                    attempt: next_attempt,
                });
                Some(Stage::Syncing {
                    attempt: next_attempt,
                })
            }

            // Terminal stages absorb; stage/event mismatches are ignored
            _ => None,
        };

        if let Some(stage) = next {
            workflow.stage = stage;
            workflow.updated_at_micros = clock.epoch_micros();
        }

        (workflow, effects)
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Failure reason, when terminal with an error
    pub fn error(&self) -> Option<&str> {
        match &self.stage {
            Stage::Failed {
                cause: FailureCause::PersistFailed { reason },
            }
            | Stage::Failed {
                cause: FailureCause::SyncFailed { reason },
            } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
