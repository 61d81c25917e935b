// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-Ahead Log (WAL) module
//!
//! Every profile write and workflow stage transition is recorded here
//! before it takes effect. The WAL is the source of truth: in-memory
//! state is derived by replaying entries on startup, which is what lets
//! in-flight updates survive a process restart.
//!
//! Durability: appends return only after `fsync()`; each entry carries a
//! CRC32 over its operation, so torn writes and bit flips surface during
//! replay, which stops at the first invalid entry. `repair_wal` truncates
//! the bad tail explicitly.

pub mod entry;
pub mod operation;
pub mod reader;
pub mod state;
pub mod store;
pub mod writer;

pub use entry::WalEntry;
pub use operation::*;
pub use reader::{WalCorruption, WalEntryIter, WalReadError, WalReader, WalValidation};
pub use state::{ApplyError, MaterializedState};
pub use store::{PruneResult, WalStore, WalStoreError};
pub use writer::WalWriter;
