// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replay side of the write-ahead log
//!
//! Reading stops at the first bad line. Everything before that point is
//! trusted; the byte offset of the cut is exposed so repair can truncate
//! there instead of discarding the whole file.

use super::entry::WalEntry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalReadError {
    #[error("corrupted entry at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("checksum mismatch at line {line}")]
    ChecksumMismatch { line: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a full scan of the log found
#[derive(Debug)]
pub struct WalValidation {
    pub valid_entries: u64,
    pub last_valid_sequence: Option<u64>,
    pub corruption: Option<WalCorruption>,
}

/// First bad line in the log, when there is one
#[derive(Debug)]
pub struct WalCorruption {
    pub line: u64,
    pub reason: String,
}

/// Read access to a log file
pub struct WalReader {
    path: PathBuf,
}

impl WalReader {
    /// A reader over `path`; a file that does not exist reads as empty
    pub fn open_or_empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Iterate entries in log order
    ///
    /// The first item that fails to parse or verify is yielded as the
    /// error that stops replay; nothing past it is read.
    pub fn entries(&self) -> Result<WalEntryIter, WalReadError> {
        let file = match File::open(&self.path) {
            Ok(f) => Some(BufReader::new(f)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(WalReadError::Io(e)),
        };

        Ok(WalEntryIter {
            file,
            line: 0,
            position: 0,
            last_valid_position: 0,
        })
    }

    /// Sequence number of the last entry before any corruption
    pub fn last_sequence(&self) -> Result<Option<u64>, WalReadError> {
        let mut last = None;
        for entry in self.entries()?.map_while(Result::ok) {
            last = Some(entry.sequence);
        }
        Ok(last)
    }

    /// Scan the whole log and report what is usable
    pub fn validate(&self) -> Result<WalValidation, WalReadError> {
        let mut report = WalValidation {
            valid_entries: 0,
            last_valid_sequence: None,
            corruption: None,
        };

        for item in self.entries()? {
            match item {
                Ok(entry) => {
                    report.valid_entries += 1;
                    report.last_valid_sequence = Some(entry.sequence);
                }
                Err(e) => {
                    report.corruption = Some(match e {
                        WalReadError::Corrupted { line, reason } => WalCorruption { line, reason },
                        WalReadError::ChecksumMismatch { line } => WalCorruption {
                            line,
                            reason: "checksum mismatch".to_string(),
                        },
                        WalReadError::Io(e) => WalCorruption {
                            line: report.valid_entries + 1,
                            reason: format!("IO error: {}", e),
                        },
                    });
                    break;
                }
            }
        }

        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Streaming iterator over log entries
///
/// Byte positions are tracked arithmetically from the bytes consumed,
/// so no seeking is needed on the underlying file.
pub struct WalEntryIter {
    file: Option<BufReader<File>>,
    line: u64,
    position: u64,
    last_valid_position: u64,
}

impl WalEntryIter {
    /// Byte offset just past the last entry that parsed and verified
    pub fn last_valid_position(&self) -> u64 {
        self.last_valid_position
    }
}

impl Iterator for WalEntryIter {
    type Item = Result<WalEntry, WalReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.file.as_mut()?;

        loop {
            let mut raw = String::new();
            let bytes = match file.read_line(&mut raw) {
                Ok(0) => return None,
                Ok(n) => n as u64,
                Err(e) => return Some(Err(WalReadError::Io(e))),
            };
            self.line += 1;

            let text = raw.trim();
            if text.is_empty() {
                self.position += bytes;
                continue;
            }

            let entry = match WalEntry::from_line(text) {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(Err(WalReadError::Corrupted {
                        line: self.line,
                        reason: e.to_string(),
                    }))
                }
            };
            if !entry.verify() {
                return Some(Err(WalReadError::ChecksumMismatch { line: self.line }));
            }

            self.position += bytes;
            self.last_valid_position = self.position;
            return Some(Ok(entry));
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
