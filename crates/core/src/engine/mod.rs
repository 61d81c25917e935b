// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine: orchestrates workflow state machines and executes effects

mod recovery;
mod runtime;
mod scheduler;

pub use recovery::{plan_resume, ResumeAction};
pub use runtime::{Engine, EngineConfig, EngineError, SyncRequest};
pub use scheduler::{ScheduledItem, ScheduledKind, Scheduler};
