// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile store backed by the WAL
//!
//! The primary store for profile records. Writes are durable before the
//! call returns: the WAL append fsyncs, then the in-memory state is
//! updated.

use crate::adapters::{ProfileStore, StoreError};
use crate::clock::Clock;
use crate::profile::{ProfileRecord, ProfileSeed, ProfileUpdate};
use crate::storage::wal::{WalStore, WalStoreError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to the WAL store
pub type SharedWal = Arc<Mutex<WalStore>>;

/// WAL-backed implementation of [`ProfileStore`]
#[derive(Clone)]
pub struct WalProfileStore<C: Clock> {
    wal: SharedWal,
    clock: C,
}

impl<C: Clock> WalProfileStore<C> {
    pub fn new(wal: SharedWal, clock: C) -> Self {
        Self { wal, clock }
    }

    fn lock(&self) -> MutexGuard<'_, WalStore> {
        self.wal.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<C: Clock> ProfileStore for WalProfileStore<C> {
    async fn get_or_create(
        &self,
        subject_id: &str,
        seed: &ProfileSeed,
    ) -> Result<ProfileRecord, StoreError> {
        let mut wal = self.lock();
        if let Some(record) = wal.profile(subject_id) {
            return Ok(record.clone());
        }

        let record = ProfileRecord::new(subject_id, seed, self.clock.epoch_micros());
        wal.create_profile(&record).map_err(store_error)?;
        tracing::debug!(subject_id, "created profile record");
        Ok(record)
    }

    async fn apply_update(
        &self,
        subject_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, StoreError> {
        let mut wal = self.lock();
        if wal.profile(subject_id).is_none() {
            return Err(StoreError::NotFound(subject_id.to_string()));
        }

        wal.merge_profile(subject_id, update, self.clock.epoch_micros())
            .map_err(store_error)
    }
}

fn store_error(err: WalStoreError) -> StoreError {
    match err {
        WalStoreError::NotFound { id, .. } => StoreError::NotFound(id),
        other => StoreError::Storage(other.to_string()),
    }
}

#[cfg(test)]
#[path = "profiles_tests.rs"]
mod tests;
