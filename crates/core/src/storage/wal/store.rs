// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL-based storage with crash recovery
//!
//! WalStore provides durable state persistence: every profile write and
//! workflow stage change is appended to the WAL before it is applied to
//! the in-memory state. Opening a store replays the WAL, which is how
//! in-flight updates survive a restart.

use super::operation::*;
use super::reader::WalReader;
use super::state::{ApplyError, MaterializedState};
use super::writer::WalWriter;
use crate::id::WorkflowId;
use crate::profile::{ProfileRecord, ProfileUpdate};
use crate::workflow::Workflow;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from WalStore operations
#[derive(Debug, Error)]
pub enum WalStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAL read error: {0}")]
    WalRead(#[from] super::reader::WalReadError),
    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("entity not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Result of pruning terminal workflows from the WAL
#[derive(Debug, Clone)]
pub struct PruneResult {
    /// Workflows removed
    pub workflows_removed: usize,
    /// WAL entries removed
    pub entries_removed: usize,
    /// Bytes reclaimed from disk
    pub bytes_reclaimed: u64,
}

/// WAL-based storage with automatic recovery
pub struct WalStore {
    base_dir: PathBuf,
    wal_path: PathBuf,
    writer: WalWriter,
    state: MaterializedState,
}

impl WalStore {
    /// Open or create a WalStore at the given directory
    ///
    /// Replays the WAL to rebuild state. Corruption stops replay at the
    /// last valid entry; it is logged but not auto-truncated, call
    /// [`WalStore::repair_wal`] to truncate explicitly.
    pub fn open(base_dir: &Path) -> Result<Self, WalStoreError> {
        std::fs::create_dir_all(base_dir)?;

        let wal_path = base_dir.join("wal.jsonl");
        let mut state = MaterializedState::new();

        let mut entries = WalReader::open_or_empty(&wal_path).entries()?;
        let replay_error = loop {
            match entries.next() {
                Some(Ok(entry)) => {
                    // Apply errors during replay indicate stale records
                    // that later entries overwrite; skip them.
                    if let Err(e) = state.apply(&entry.operation) {
                        tracing::warn!(sequence = entry.sequence, ?e, "skipping stale WAL entry");
                    }
                }
                Some(Err(e)) => break Some(e),
                None => break None,
            }
        };

        if let Some(e) = replay_error {
            tracing::warn!(
                ?e,
                replay_stopped_at = entries.last_valid_position(),
                "bad tail in WAL left in place; repair_wal truncates it"
            );
        }

        let writer = WalWriter::open(&wal_path)?;

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            wal_path,
            writer,
            state,
        })
    }

    /// Create a WalStore in a temporary directory (for testing)
    pub fn open_temp() -> Result<Self, WalStoreError> {
        let temp_dir = std::env::temp_dir().join(format!("pp-walstore-{}", uuid::Uuid::new_v4()));
        Self::open(&temp_dir)
    }

    /// Repair a WAL file by truncating at the first corruption point.
    ///
    /// This should be called during explicit crash recovery, not during
    /// normal operation. Returns the number of bytes removed, or 0 if no
    /// corruption was found.
    pub fn repair_wal(base_dir: &Path) -> Result<u64, WalStoreError> {
        let wal_path = base_dir.join("wal.jsonl");

        if !wal_path.exists() {
            return Ok(0);
        }

        let mut entries = WalReader::open_or_empty(&wal_path).entries()?;
        let clean = entries.all(|item| item.is_ok());
        if clean {
            return Ok(0);
        }

        let keep = entries.last_valid_position();
        let size = std::fs::metadata(&wal_path).map(|m| m.len()).unwrap_or(0);
        if keep >= size {
            return Ok(0);
        }

        Self::truncate_wal_file(&wal_path, keep)?;
        Ok(size - keep)
    }

    /// Cut the log at `position`, durably
    fn truncate_wal_file(wal_path: &Path, position: u64) -> Result<(), WalStoreError> {
        let file = std::fs::OpenOptions::new().write(true).open(wal_path)?;
        file.set_len(position)?;
        file.sync_all()?;

        tracing::info!(position, "truncated WAL past last valid entry");
        Ok(())
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.writer.sequence()
    }

    // === Profile Operations ===

    /// Get a profile by subject identifier
    pub fn profile(&self, subject_id: &str) -> Option<&ProfileRecord> {
        self.state.profile(subject_id)
    }

    /// Record creation of a profile
    pub fn create_profile(&mut self, record: &ProfileRecord) -> Result<(), WalStoreError> {
        let op = Operation::ProfileCreate(ProfileCreateOp {
            subject_id: record.subject_id.clone(),
            email: record.email.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            created_at_micros: record.created_at_micros,
        });
        self.append_operation(op)?;
        Ok(())
    }

    /// Merge a partial update into an existing profile
    ///
    /// Returns the merged record.
    pub fn merge_profile(
        &mut self,
        subject_id: &str,
        update: &ProfileUpdate,
        updated_at_micros: u64,
    ) -> Result<ProfileRecord, WalStoreError> {
        if self.state.profile(subject_id).is_none() {
            return Err(WalStoreError::NotFound {
                kind: "profile",
                id: subject_id.to_string(),
            });
        }

        let op = Operation::ProfileMerge(ProfileMergeOp {
            subject_id: subject_id.to_string(),
            update: update.clone(),
            updated_at_micros,
        });
        self.append_operation(op)?;

        self.state
            .profile(subject_id)
            .cloned()
            .ok_or_else(|| WalStoreError::NotFound {
                kind: "profile",
                id: subject_id.to_string(),
            })
    }

    // === Workflow Operations ===

    /// Get a workflow by id
    pub fn workflow(&self, id: &WorkflowId) -> Option<&Workflow> {
        self.state.workflow(id)
    }

    /// List all workflow ids
    pub fn list_workflows(&self) -> Vec<WorkflowId> {
        self.state.workflows.keys().cloned().collect()
    }

    /// Save a workflow (create or transition)
    pub fn save_workflow(&mut self, workflow: &Workflow) -> Result<(), WalStoreError> {
        if let Some(old) = self.state.workflow(&workflow.id) {
            if old.stage == workflow.stage {
                return Ok(());
            }
            let op = Operation::WorkflowTransition(WorkflowTransitionOp::new(
                &workflow.id.0,
                &workflow.subject_id,
                &old.stage,
                &workflow.stage,
                workflow.updated_at_micros,
            ));
            self.append_operation(op)?;
        } else {
            let op = Operation::WorkflowCreate(WorkflowCreateOp {
                id: workflow.id.0.clone(),
                subject_id: workflow.subject_id.clone(),
                update: workflow.update.clone(),
                created_at_micros: workflow.created_at_micros,
            });
            self.append_operation(op)?;
        }

        Ok(())
    }

    // === Retention ===

    /// Prune terminal workflows older than the retention window.
    ///
    /// Rewrites the WAL without the entries belonging to pruned
    /// workflows, preserving sequence numbers, then atomically replaces
    /// the old file. Profile entries are always kept.
    pub fn prune_terminal(
        &mut self,
        now_micros: u64,
        retention: Duration,
    ) -> Result<PruneResult, WalStoreError> {
        let cutoff = now_micros.saturating_sub(retention.as_micros() as u64);

        let pruned: HashSet<String> = self
            .state
            .workflows
            .values()
            .filter(|w| w.is_terminal() && w.updated_at_micros < cutoff)
            .map(|w| w.id.0.clone())
            .collect();

        if pruned.is_empty() {
            return Ok(PruneResult {
                workflows_removed: 0,
                entries_removed: 0,
                bytes_reclaimed: 0,
            });
        }

        let old_size = std::fs::metadata(&self.wal_path)
            .map(|m| m.len())
            .unwrap_or(0);

        // Collect surviving entries, preserving original sequences
        let reader = WalReader::open_or_empty(&self.wal_path);
        let mut kept = Vec::new();
        let mut entries_removed = 0usize;
        for entry_result in reader.entries()? {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(_) => break, // Corrupt tail is dropped by the rewrite
            };
            match entry.operation.workflow_id() {
                Some(id) if pruned.contains(id) => entries_removed += 1,
                _ => kept.push(entry),
            }
        }

        // Write to a temporary file, then atomically replace
        let temp_path = self.wal_path.with_extension("jsonl.prune.tmp");
        {
            let mut file = std::fs::File::create(&temp_path)?;
            for entry in &kept {
                let line = entry.to_line()?;
                file.write_all(line.as_bytes())?;
                file.write_all(b"\n")?;
            }
            file.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.wal_path)?;

        self.writer = WalWriter::open(&self.wal_path)?;

        for id in &pruned {
            self.state.workflows.remove(&WorkflowId(id.clone()));
        }

        let new_size = std::fs::metadata(&self.wal_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let bytes_reclaimed = old_size.saturating_sub(new_size);

        tracing::info!(
            workflows_removed = pruned.len(),
            entries_removed,
            bytes_reclaimed,
            "pruned terminal workflows from WAL"
        );

        Ok(PruneResult {
            workflows_removed: pruned.len(),
            entries_removed,
            bytes_reclaimed,
        })
    }

    /// Get materialized state (for read operations)
    pub fn state(&self) -> &MaterializedState {
        &self.state
    }

    // === Internal Operations ===

    /// Append an operation to the WAL and apply it to state
    fn append_operation(&mut self, op: Operation) -> Result<u64, WalStoreError> {
        let sequence = self.writer.append(op.clone())?;
        self.state.apply(&op)?;
        Ok(sequence)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
