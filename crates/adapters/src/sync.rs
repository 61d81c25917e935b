// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP adapter pushing profile records to the external system

use async_trait::async_trait;
use pp_core::{Clock, ProfileRecord, SyncAdapter, SyncError};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the external sync target
#[derive(Debug, Clone)]
pub struct SyncTargetConfig {
    /// Base endpoint URL; `None` means the target is unconfigured
    pub endpoint: Option<String>,
    /// Value sent in the payload's `source` field
    pub source: String,
    /// Per-call timeout covering connect plus response
    pub timeout: Duration,
}

impl Default for SyncTargetConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            source: "profile-pipeline".to_string(),
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncPayload<'a> {
    subject_id: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    email: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    first_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    last_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    phone_number: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    city: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pincode: &'a str,
    synced_at_micros: u64,
    source: &'a str,
}

/// Sends profile records to the external system over HTTP
///
/// Updates go as PUT to `{endpoint}/{subject_id}`; a 404 means the record
/// does not exist remotely yet, so a single POST create to `{endpoint}`
/// is issued and its result is authoritative.
#[derive(Clone)]
pub struct HttpSyncAdapter<C: Clock> {
    client: reqwest::Client,
    config: SyncTargetConfig,
    clock: C,
}

impl<C: Clock> HttpSyncAdapter<C> {
    pub fn new(config: SyncTargetConfig, clock: C) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Fatal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            config,
            clock,
        })
    }

    fn endpoint(&self) -> Result<&str, SyncError> {
        self.config
            .endpoint
            .as_deref()
            .ok_or_else(|| SyncError::Fatal("sync endpoint URL is not configured".to_string()))
    }

    fn payload<'a>(&'a self, subject_id: &'a str, record: &'a ProfileRecord) -> SyncPayload<'a> {
        SyncPayload {
            subject_id,
            email: &record.email,
            first_name: &record.first_name,
            last_name: &record.last_name,
            phone_number: &record.phone_number,
            city: &record.city,
            pincode: &record.pincode,
            synced_at_micros: self.clock.epoch_micros(),
            source: &self.config.source,
        }
    }

    async fn create(
        &self,
        endpoint: &str,
        subject_id: &str,
        record: &ProfileRecord,
    ) -> Result<(), SyncError> {
        let response = self
            .client
            .post(endpoint)
            .json(&self.payload(subject_id, record))
            .send()
            .await
            .map_err(transient)?;

        if response.status().is_success() {
            tracing::info!(subject_id, "created remote profile after 404");
            Ok(())
        } else {
            Err(SyncError::Transient(format!(
                "create returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl<C: Clock> SyncAdapter for HttpSyncAdapter<C> {
    fn check_config(&self) -> Result<(), SyncError> {
        self.endpoint().map(|_| ())
    }

    async fn sync(&self, subject_id: &str, record: &ProfileRecord) -> Result<(), SyncError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), subject_id);

        let response = self
            .client
            .put(&url)
            .json(&self.payload(subject_id, record))
            .send()
            .await
            .map_err(transient)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            // Remote record absent: fall back to create
            return self.create(endpoint, subject_id, record).await;
        }
        Err(SyncError::Transient(format!("update returned {status}")))
    }
}

fn transient(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::Transient(format!("request timed out: {e}"))
    } else {
        SyncError::Transient(e.to_string())
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
