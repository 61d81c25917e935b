// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append side of the write-ahead log
//!
//! Every append is fsync'd before it returns; a workflow stage only
//! advances once the entry recording it is on disk.

use super::entry::WalEntry;
use super::operation::Operation;
use super::reader::{WalReadError, WalReader};
use crate::storage::StorageError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct WalWriter {
    path: PathBuf,
    log: File,
    next_sequence: u64,
}

impl WalWriter {
    /// Open the log for appending, creating it if absent
    ///
    /// Sequence numbering continues from the last valid entry already in
    /// the file; trailing corruption is left in place for `repair_wal`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last = match WalReader::open_or_empty(path).last_sequence() {
            Ok(last) => last,
            Err(WalReadError::Io(e)) => return Err(StorageError::Io(e)),
            Err(_) => None,
        };

        let log = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            log,
            next_sequence: last.map_or(0, |s| s + 1),
        })
    }

    /// Durably append an operation, returning its sequence number
    pub fn append(&mut self, operation: Operation) -> Result<u64, StorageError> {
        let sequence = self.take_sequence();
        self.push(&WalEntry::new(sequence, operation))?;
        Ok(sequence)
    }

    /// Append with an explicit timestamp (for tests)
    pub fn append_with_timestamp(
        &mut self,
        operation: Operation,
        timestamp_micros: u64,
    ) -> Result<u64, StorageError> {
        let sequence = self.take_sequence();
        self.push(&WalEntry::new_with_timestamp(
            sequence,
            timestamp_micros,
            operation,
        ))?;
        Ok(sequence)
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn push(&mut self, entry: &WalEntry) -> Result<(), StorageError> {
        let mut line = entry.to_line()?;
        line.push('\n');
        self.log.write_all(line.as_bytes())?;
        // Durability point: the append is not acknowledged until synced
        self.log.sync_all()?;
        Ok(())
    }

    /// The sequence number the next append will receive
    pub fn sequence(&self) -> u64 {
        self.next_sequence
    }

    /// The most recently assigned sequence number, if any
    pub fn last_sequence(&self) -> Option<u64> {
        self.next_sequence.checked_sub(1)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
