// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update-workflow state machine

mod retry;
mod state;

pub use retry::RetryPolicy;
pub use state::{Effect, FailureCause, Stage, Workflow, WorkflowEvent};
