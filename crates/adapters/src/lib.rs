// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external I/O: JWKS token verification and HTTP sync

pub mod sync;
pub mod verifier;

pub use sync::{HttpSyncAdapter, SyncTargetConfig};
pub use verifier::{HttpKeySource, JwksVerifier, KeySource, KeySourceError, VerifierConfig};
