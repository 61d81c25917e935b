// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Profile Pipeline server (ppd)
//!
//! HTTP intake plus the engine task that owns the durable update
//! pipeline.

pub mod config;
pub mod handle;
pub mod routes;

pub use config::{Config, ConfigError};
pub use handle::{run_engine, Command, EngineHandle, HandleError};
pub use routes::{router, AppState};
