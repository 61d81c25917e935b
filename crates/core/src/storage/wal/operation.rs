// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL operation types
//!
//! All state-changing operations are represented as typed operations.
//! These form the source of truth for the WAL: a profile write is a
//! create or merge, a workflow change is a create or a stage transition.

use crate::profile::ProfileUpdate;
use crate::workflow::{FailureCause, Stage};
use serde::{Deserialize, Serialize};

/// All state-changing operations in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    // Profile operations
    ProfileCreate(ProfileCreateOp),
    ProfileMerge(ProfileMergeOp),

    // Workflow operations
    WorkflowCreate(WorkflowCreateOp),
    WorkflowTransition(WorkflowTransitionOp),
}

impl Operation {
    /// Subject identifier the operation belongs to
    pub fn subject_id(&self) -> &str {
        match self {
            Operation::ProfileCreate(op) => &op.subject_id,
            Operation::ProfileMerge(op) => &op.subject_id,
            Operation::WorkflowCreate(op) => &op.subject_id,
            Operation::WorkflowTransition(op) => &op.subject_id,
        }
    }

    /// Workflow id, for workflow-scoped operations
    pub fn workflow_id(&self) -> Option<&str> {
        match self {
            Operation::WorkflowCreate(op) => Some(&op.id),
            Operation::WorkflowTransition(op) => Some(&op.id),
            _ => None,
        }
    }
}

// Profile operations

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCreateOp {
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    pub created_at_micros: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMergeOp {
    pub subject_id: String,
    pub update: ProfileUpdate,
    pub updated_at_micros: u64,
}

// Workflow operations

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowCreateOp {
    pub id: String,
    pub subject_id: String,
    pub update: ProfileUpdate,
    pub created_at_micros: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTransitionOp {
    pub id: String,
    pub subject_id: String,
    pub from_stage: String,
    pub to_stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_at_micros: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    pub updated_at_micros: u64,
}

impl WorkflowTransitionOp {
    /// Build a transition op recording the stage change
    pub fn new(
        id: &str,
        subject_id: &str,
        from: &Stage,
        to: &Stage,
        updated_at_micros: u64,
    ) -> Self {
        let mut op = Self {
            id: id.to_string(),
            subject_id: subject_id.to_string(),
            from_stage: from.name().to_string(),
            to_stage: to.name().to_string(),
            fire_at_micros: None,
            attempt: None,
            failed_kind: None,
            failed_reason: None,
            updated_at_micros,
        };
        match to {
            Stage::Waiting { fire_at_micros } => op.fire_at_micros = Some(*fire_at_micros),
            Stage::Syncing { attempt } => op.attempt = Some(*attempt),
            Stage::Failed { cause } => match cause {
                FailureCause::PersistFailed { reason } => {
                    op.failed_kind = Some("persist_failed".to_string());
                    op.failed_reason = Some(reason.clone());
                }
                FailureCause::SyncFailed { reason } => {
                    op.failed_kind = Some("sync_failed".to_string());
                    op.failed_reason = Some(reason.clone());
                }
            },
            _ => {}
        }
        op
    }

    /// Reconstruct the target stage from the recorded fields
    pub fn target_stage(&self) -> Option<Stage> {
        match self.to_stage.as_str() {
            "started" => Some(Stage::Started),
            "persisted" => Some(Stage::Persisted),
            "waiting" => Some(Stage::Waiting {
                fire_at_micros: self.fire_at_micros?,
            }),
            "syncing" => Some(Stage::Syncing {
                attempt: self.attempt?,
            }),
            "completed" => Some(Stage::Completed),
            "failed" => {
                let reason = self.failed_reason.clone()?;
                let cause = match self.failed_kind.as_deref()? {
                    "persist_failed" => FailureCause::PersistFailed { reason },
                    _ => FailureCause::SyncFailed { reason },
                };
                Some(Stage::Failed { cause })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
