// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for profiles and workflow state

pub mod profiles;
pub mod wal;

use thiserror::Error;

/// Errors from serializing or persisting storage records
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use profiles::{SharedWal, WalProfileStore};
pub use wal::{MaterializedState, WalStore, WalStoreError};
