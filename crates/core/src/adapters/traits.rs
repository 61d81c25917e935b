// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter trait definitions for external integrations

use crate::profile::{IdentityClaim, ProfileRecord, ProfileSeed, ProfileUpdate};
use async_trait::async_trait;
use thiserror::Error;

// =============================================================================
// Token Verifier
// =============================================================================

/// Errors from credential verification
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("access token required")]
    Missing,
    #[error("invalid token: {reason}")]
    Invalid { reason: String },
}

impl AuthError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Verifies a bearer credential and extracts the caller's identity
#[async_trait]
pub trait TokenVerifier: Clone + Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError>;
}

// =============================================================================
// Profile Store
// =============================================================================

/// Errors from profile store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Idempotent create-or-update store for profile records
#[async_trait]
pub trait ProfileStore: Clone + Send + Sync + 'static {
    /// Return the record for a subject, creating one from the seed if absent
    ///
    /// Seed fields are ignored when the record already exists.
    async fn get_or_create(
        &self,
        subject_id: &str,
        seed: &ProfileSeed,
    ) -> Result<ProfileRecord, StoreError>;

    /// Merge a partial update into an existing record
    ///
    /// Fails with `NotFound` when no record exists for the subject.
    async fn apply_update(
        &self,
        subject_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, StoreError>;
}

// =============================================================================
// External Sync
// =============================================================================

/// Errors from the external sync target
#[derive(Debug, Error)]
pub enum SyncError {
    /// Retry may succeed: non-2xx response, timeout, connection failure
    #[error("transient sync failure: {0}")]
    Transient(String),
    /// Retry cannot succeed: misconfiguration
    #[error("sync misconfigured: {0}")]
    Fatal(String),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transient(_))
    }
}

/// Pushes profile data to the secondary external system
///
/// Implementations must be safe to invoke repeatedly with identical
/// arguments; the workflow's retry policy bounds duplicate-send exposure.
#[async_trait]
pub trait SyncAdapter: Clone + Send + Sync + 'static {
    /// Validate configuration presence without touching the network
    fn check_config(&self) -> Result<(), SyncError>;

    /// Send the full record to the external system
    async fn sync(&self, subject_id: &str, record: &ProfileRecord) -> Result<(), SyncError>;
}

// =============================================================================
// Bundle
// =============================================================================

/// Adapters bundle handed to the engine
pub trait Adapters: Clone + Send + Sync + 'static {
    type Profiles: ProfileStore;
    type Sync: SyncAdapter;

    fn profiles(&self) -> Self::Profiles;
    fn sync(&self) -> Self::Sync;
}

/// Plain bundle of concrete adapter implementations
#[derive(Clone)]
pub struct AdapterBundle<P, S> {
    pub profiles: P,
    pub sync: S,
}

impl<P: ProfileStore, S: SyncAdapter> Adapters for AdapterBundle<P, S> {
    type Profiles = P;
    type Sync = S;

    fn profiles(&self) -> P {
        self.profiles.clone()
    }

    fn sync(&self) -> S {
        self.sync.clone()
    }
}
