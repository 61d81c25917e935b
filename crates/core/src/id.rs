// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow instance identifiers
//!
//! Ids are derived from the subject identifier plus the submission
//! timestamp, so repeated submissions from one caller never collide.

use serde::{Deserialize, Serialize};

/// Unique identifier for one update-workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    /// Derive an id from the verified subject and submission time
    pub fn derive(subject_id: &str, submitted_micros: u64) -> Self {
        Self(format!("update-{}-{}", subject_id, submitted_micros))
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
