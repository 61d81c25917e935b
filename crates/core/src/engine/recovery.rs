// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart recovery planning for in-flight workflows
//!
//! After WAL replay each non-terminal workflow sits at its last recorded
//! stage. The planner is pure: it maps that stage to the action the
//! engine must take to resume the workflow where it left off.

use crate::workflow::{Stage, Workflow};

/// The action needed to resume a recovered workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeAction {
    /// Crash before the primary-store write completed: run it again
    RunPersist,
    /// Persisted but the delay was never armed: arm it now
    StartDelay,
    /// Delay was armed: re-arm the timer for the remaining time
    ArmTimer { fire_at_micros: u64 },
    /// Crash mid-sync: re-issue the current attempt (at-least-once)
    RunSync { attempt: u32 },
}

/// Determine how to resume a workflow after restart
///
/// Returns `None` for terminal workflows.
pub fn plan_resume(workflow: &Workflow) -> Option<ResumeAction> {
    match &workflow.stage {
        Stage::Started => Some(ResumeAction::RunPersist),
        Stage::Persisted => Some(ResumeAction::StartDelay),
        Stage::Waiting { fire_at_micros } => Some(ResumeAction::ArmTimer {
            fire_at_micros: *fire_at_micros,
        }),
        Stage::Syncing { attempt } => Some(ResumeAction::RunSync { attempt: *attempt }),
        Stage::Completed | Stage::Failed { .. } => None,
    }
}
