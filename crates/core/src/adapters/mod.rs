// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter traits for external integrations

mod fake;
mod traits;

pub use fake::{AdapterCall, FakeAdapters, FakeProfileStore, FakeSyncAdapter, FakeVerifier};
pub use traits::{
    AdapterBundle, Adapters, AuthError, ProfileStore, StoreError, SyncAdapter, SyncError,
    TokenVerifier,
};
