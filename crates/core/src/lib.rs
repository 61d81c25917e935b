// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pp-core: Core library for the Profile Pipeline daemon
//!
//! This crate provides:
//! - The pure workflow state machine sequencing persist → delay → sync
//! - Adapter traits for external integrations (token verifier, profile
//!   store, sync target)
//! - WAL-based durable storage with crash recovery
//! - The engine driving timers, retries, and restart resume

pub mod clock;
pub mod id;

pub mod adapters;
pub mod engine;
pub mod profile;
pub mod storage;
pub mod workflow;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::WorkflowId;
pub use profile::{IdentityClaim, ProfileRecord, ProfileSeed, ProfileUpdate};
pub use workflow::{Effect, FailureCause, RetryPolicy, Stage, Workflow, WorkflowEvent};

// Re-export adapters
pub use adapters::{
    AdapterBundle, Adapters, AuthError, FakeAdapters, FakeVerifier, ProfileStore, StoreError,
    SyncAdapter, SyncError, TokenVerifier,
};

// Re-export storage and engine
pub use engine::{Engine, EngineConfig, EngineError, ResumeAction, SyncRequest};
pub use storage::{SharedWal, WalProfileStore, WalStore, WalStoreError};
