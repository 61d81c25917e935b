// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapter implementations for testing

use super::traits::*;
use crate::profile::{IdentityClaim, ProfileRecord, ProfileSeed, ProfileUpdate};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Recorded call to an adapter method, in invocation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    GetOrCreate {
        subject_id: String,
    },
    ApplyUpdate {
        subject_id: String,
        update: ProfileUpdate,
    },
    Sync {
        subject_id: String,
    },
}

/// Scripted outcome for one sync invocation
#[derive(Debug, Clone)]
enum SyncScript {
    Ok,
    Transient(String),
    Fatal(String),
}

/// Shared state for fake adapters
#[derive(Default)]
struct FakeState {
    calls: Vec<AdapterCall>,
    profiles: HashMap<String, ProfileRecord>,
    ticks: u64,
    // Configurable failure modes
    persist_error: Option<String>,
    config_error: Option<String>,
    sync_script: VecDeque<SyncScript>,
    sync_fails_forever: Option<String>,
}

impl FakeState {
    fn next_micros(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }
}

/// Fake adapters with call recording for testing
#[derive(Clone, Default)]
pub struct FakeAdapters {
    state: Arc<Mutex<FakeState>>,
}

impl FakeAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.lock().calls.clone()
    }

    /// Clear recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of sync invocations recorded
    pub fn sync_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, AdapterCall::Sync { .. }))
            .count()
    }

    /// Current stored record for a subject, if any
    pub fn profile(&self, subject_id: &str) -> Option<ProfileRecord> {
        self.lock().profiles.get(subject_id).cloned()
    }

    /// Pre-populate a stored record
    pub fn insert_profile(&self, record: ProfileRecord) {
        self.lock()
            .profiles
            .insert(record.subject_id.clone(), record);
    }

    /// Make every persist call fail
    pub fn fail_persist(&self, reason: impl Into<String>) {
        self.lock().persist_error = Some(reason.into());
    }

    /// Make `check_config` report a missing sync target
    pub fn fail_config(&self, reason: impl Into<String>) {
        self.lock().config_error = Some(reason.into());
    }

    /// Script the next sync call to fail transiently
    pub fn push_sync_transient(&self, reason: impl Into<String>) {
        self.lock()
            .sync_script
            .push_back(SyncScript::Transient(reason.into()));
    }

    /// Script the next sync call to fail fatally
    pub fn push_sync_fatal(&self, reason: impl Into<String>) {
        self.lock()
            .sync_script
            .push_back(SyncScript::Fatal(reason.into()));
    }

    /// Make every sync call fail transiently
    pub fn fail_sync_forever(&self, reason: impl Into<String>) {
        self.lock().sync_fails_forever = Some(reason.into());
    }

    /// Get the profile store adapter
    pub fn profiles(&self) -> FakeProfileStore {
        FakeProfileStore {
            state: self.state.clone(),
        }
    }

    /// Get the sync adapter
    pub fn sync(&self) -> FakeSyncAdapter {
        FakeSyncAdapter {
            state: self.state.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Adapters for FakeAdapters {
    type Profiles = FakeProfileStore;
    type Sync = FakeSyncAdapter;

    fn profiles(&self) -> FakeProfileStore {
        self.profiles()
    }

    fn sync(&self) -> FakeSyncAdapter {
        self.sync()
    }
}

/// Fake in-memory profile store
#[derive(Clone)]
pub struct FakeProfileStore {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn get_or_create(
        &self,
        subject_id: &str,
        seed: &ProfileSeed,
    ) -> Result<ProfileRecord, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(AdapterCall::GetOrCreate {
            subject_id: subject_id.to_string(),
        });

        if let Some(record) = state.profiles.get(subject_id) {
            return Ok(record.clone());
        }
        let now = state.next_micros();
        let record = ProfileRecord::new(subject_id, seed, now);
        state
            .profiles
            .insert(subject_id.to_string(), record.clone());
        Ok(record)
    }

    async fn apply_update(
        &self,
        subject_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(AdapterCall::ApplyUpdate {
            subject_id: subject_id.to_string(),
            update: update.clone(),
        });

        if let Some(reason) = &state.persist_error {
            return Err(StoreError::Storage(reason.clone()));
        }
        let Some(existing) = state.profiles.get(subject_id).cloned() else {
            return Err(StoreError::NotFound(subject_id.to_string()));
        };
        let now = state.next_micros();
        let merged = existing.merged(update, now);
        state
            .profiles
            .insert(subject_id.to_string(), merged.clone());
        Ok(merged)
    }
}

/// Fake sync adapter with scripted outcomes
#[derive(Clone)]
pub struct FakeSyncAdapter {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl SyncAdapter for FakeSyncAdapter {
    fn check_config(&self) -> Result<(), SyncError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &state.config_error {
            Some(reason) => Err(SyncError::Fatal(reason.clone())),
            None => Ok(()),
        }
    }

    async fn sync(&self, subject_id: &str, _record: &ProfileRecord) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(AdapterCall::Sync {
            subject_id: subject_id.to_string(),
        });

        if let Some(reason) = &state.sync_fails_forever {
            return Err(SyncError::Transient(reason.clone()));
        }
        match state.sync_script.pop_front() {
            None | Some(SyncScript::Ok) => Ok(()),
            Some(SyncScript::Transient(reason)) => Err(SyncError::Transient(reason)),
            Some(SyncScript::Fatal(reason)) => Err(SyncError::Fatal(reason)),
        }
    }
}

/// Fake verifier mapping known token strings to claims
#[derive(Clone, Default)]
pub struct FakeVerifier {
    claims: Arc<Mutex<HashMap<String, IdentityClaim>>>,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token as valid for the given claim
    pub fn allow(&self, token: impl Into<String>, claim: IdentityClaim) {
        self.claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.into(), claim);
    }
}

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError> {
        self.claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::invalid("unknown token"))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
