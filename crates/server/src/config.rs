// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration, read from the environment

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub listen_addr: SocketAddr,
    /// Directory holding the WAL and the server log
    pub state_dir: PathBuf,
    /// Issuer domain whose JWKS document signs incoming tokens
    pub issuer_domain: String,
    /// Expected token audience
    pub audience: String,
    /// External sync endpoint; absent means every update fails fast
    pub sync_url: Option<String>,
    /// `source` field stamped on outgoing sync payloads
    pub sync_source: String,
    /// Mandatory delay between persist and sync
    pub sync_delay: Duration,
    /// Per-call sync request timeout
    pub sync_timeout: Duration,
    /// Maximum sync attempts, including the first
    pub sync_max_attempts: u32,
    /// How long terminal workflows are retained before pruning
    pub retention: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let listen_addr = match vars.get("PP_LISTEN_ADDR") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                var: "PP_LISTEN_ADDR",
                reason: format!("{e}"),
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 8080)),
        };

        let state_dir = vars
            .get("PP_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".pp"));

        let issuer_domain = vars
            .get("PP_ISSUER_DOMAIN")
            .cloned()
            .ok_or(ConfigError::MissingVar("PP_ISSUER_DOMAIN"))?;
        let audience = vars
            .get("PP_AUDIENCE")
            .cloned()
            .ok_or(ConfigError::MissingVar("PP_AUDIENCE"))?;

        Ok(Self {
            listen_addr,
            state_dir,
            issuer_domain,
            audience,
            sync_url: vars.get("PP_SYNC_URL").cloned(),
            sync_source: vars
                .get("PP_SYNC_SOURCE")
                .cloned()
                .unwrap_or_else(|| "profile-pipeline".to_string()),
            sync_delay: secs(vars, "PP_SYNC_DELAY_SECS", 10)?,
            sync_timeout: secs(vars, "PP_SYNC_TIMEOUT_SECS", 30)?,
            sync_max_attempts: int(vars, "PP_SYNC_MAX_ATTEMPTS", 3)?,
            retention: secs(vars, "PP_RETENTION_SECS", 86_400)?,
        })
    }

    /// Directory the WAL store opens
    pub fn wal_dir(&self) -> PathBuf {
        self.state_dir.join("wal")
    }

    /// Path of the server log file
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("ppd.log")
    }
}

fn int(
    vars: &HashMap<String, String>,
    var: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match vars.get(var) {
        Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("{e}"),
        }),
        None => Ok(default),
    }
}

fn secs(
    vars: &HashMap<String, String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match vars.get(var) {
        Some(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                var,
                reason: format!("{e}"),
            }),
        None => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
