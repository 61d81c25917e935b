// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay
//!
//! The MaterializedState is the in-memory representation of all profiles
//! and workflow instances, reconstructed by replaying WAL operations.

use super::operation::*;
use crate::id::WorkflowId;
use crate::profile::{ProfileRecord, ProfileSeed};
use crate::workflow::{Stage, Workflow};
use std::collections::HashMap;
use thiserror::Error;

/// Error applying an operation to state
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("entity not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("entity already exists: {kind} {id}")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

/// Full system state materialized from WAL
#[derive(Debug, Clone, Default)]
pub struct MaterializedState {
    /// Profiles keyed by subject identifier
    pub profiles: HashMap<String, ProfileRecord>,
    /// Workflow instances keyed by workflow id
    pub workflows: HashMap<WorkflowId, Workflow>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a profile by subject identifier
    pub fn profile(&self, subject_id: &str) -> Option<&ProfileRecord> {
        self.profiles.get(subject_id)
    }

    /// Get a workflow by id
    pub fn workflow(&self, id: &WorkflowId) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    /// Apply an operation to the state
    pub fn apply(&mut self, operation: &Operation) -> Result<(), ApplyError> {
        match operation {
            Operation::ProfileCreate(op) => {
                if self.profiles.contains_key(&op.subject_id) {
                    return Err(ApplyError::AlreadyExists {
                        kind: "profile",
                        id: op.subject_id.clone(),
                    });
                }
                let seed = ProfileSeed {
                    email: some_if_nonempty(&op.email),
                    first_name: some_if_nonempty(&op.first_name),
                    last_name: some_if_nonempty(&op.last_name),
                };
                let record = ProfileRecord::new(&op.subject_id, &seed, op.created_at_micros);
                self.profiles.insert(op.subject_id.clone(), record);
                Ok(())
            }

            Operation::ProfileMerge(op) => {
                let record =
                    self.profiles
                        .get(&op.subject_id)
                        .ok_or_else(|| ApplyError::NotFound {
                            kind: "profile",
                            id: op.subject_id.clone(),
                        })?;
                let merged = record.merged(&op.update, op.updated_at_micros);
                self.profiles.insert(op.subject_id.clone(), merged);
                Ok(())
            }

            Operation::WorkflowCreate(op) => {
                let id = WorkflowId(op.id.clone());
                if self.workflows.contains_key(&id) {
                    return Err(ApplyError::AlreadyExists {
                        kind: "workflow",
                        id: op.id.clone(),
                    });
                }
                let workflow = Workflow {
                    id: id.clone(),
                    subject_id: op.subject_id.clone(),
                    update: op.update.clone(),
                    stage: Stage::Started,
                    created_at_micros: op.created_at_micros,
                    updated_at_micros: op.created_at_micros,
                };
                self.workflows.insert(id, workflow);
                Ok(())
            }

            Operation::WorkflowTransition(op) => {
                let id = WorkflowId(op.id.clone());
                let workflow =
                    self.workflows
                        .get_mut(&id)
                        .ok_or_else(|| ApplyError::NotFound {
                            kind: "workflow",
                            id: op.id.clone(),
                        })?;
                let stage = op.target_stage().ok_or_else(|| {
                    ApplyError::InvalidTransition(format!(
                        "workflow {} has unrecognized stage '{}'",
                        op.id, op.to_stage
                    ))
                })?;
                workflow.stage = stage;
                workflow.updated_at_micros = op.updated_at_micros;
                Ok(())
            }
        }
    }
}

fn some_if_nonempty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
