// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The on-disk unit of the write-ahead log
//!
//! One entry is one line of JSON. The checksum covers the serialized
//! operation, so a torn write or a flipped bit is detectable on replay.

use super::operation::Operation;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single durable log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Position in the log, assigned by the writer
    pub sequence: u64,
    /// When the entry was recorded, microseconds since the Unix epoch
    pub timestamp_micros: u64,
    pub operation: Operation,
    /// CRC32 over the serialized operation
    pub checksum: u32,
}

impl WalEntry {
    /// Build an entry stamped with the current wall-clock time
    pub fn new(sequence: u64, operation: Operation) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::new_with_timestamp(sequence, now, operation)
    }

    /// Build an entry with a caller-chosen timestamp
    pub fn new_with_timestamp(sequence: u64, timestamp_micros: u64, operation: Operation) -> Self {
        Self {
            sequence,
            timestamp_micros,
            checksum: checksum_of(&operation),
            operation,
        }
    }

    /// True when the stored checksum still matches the operation
    pub fn verify(&self) -> bool {
        self.checksum == checksum_of(&self.operation)
    }

    /// One line of JSON, without the trailing newline
    pub fn to_line(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_line(line: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(line)?)
    }
}

fn checksum_of(operation: &Operation) -> u32 {
    // Operations hold only strings, integers, and options; serializing
    // them cannot fail.
    let json = serde_json::to_string(operation).unwrap_or_default();
    crc32fast::hash(json.as_bytes())
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
