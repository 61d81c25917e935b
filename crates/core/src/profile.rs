// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile domain types
//!
//! A profile is keyed by the caller's subject identifier and mutated only
//! through typed partial updates: fields absent from an update are left
//! untouched. Arbitrary request-body keys are never spread into the
//! record.

use serde::{Deserialize, Serialize};

/// Identity claims extracted from a verified bearer credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    /// Stable, globally unique caller identifier
    pub subject: String,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Token expiry, seconds since the Unix epoch
    pub expires_at: u64,
}

impl IdentityClaim {
    /// Seed fields for first-time profile creation
    pub fn seed(&self) -> ProfileSeed {
        ProfileSeed {
            email: self.email.clone(),
            first_name: self.given_name.clone(),
            last_name: self.family_name.clone(),
        }
    }
}

/// Fallback fields used when a profile is created implicitly
///
/// Ignored entirely when a record already exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSeed {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A profile record, one per subject identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub subject_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub pincode: String,
    pub created_at_micros: u64,
    pub updated_at_micros: u64,
}

impl ProfileRecord {
    /// Create a fresh record seeded from identity-claim fields
    pub fn new(subject_id: impl Into<String>, seed: &ProfileSeed, now_micros: u64) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: seed.email.clone().unwrap_or_default(),
            first_name: seed.first_name.clone().unwrap_or_default(),
            last_name: seed.last_name.clone().unwrap_or_default(),
            phone_number: String::new(),
            city: String::new(),
            pincode: String::new(),
            created_at_micros: now_micros,
            updated_at_micros: now_micros,
        }
    }

    /// Merge a partial update into this record
    ///
    /// Only fields present in the update overwrite existing values.
    pub fn merged(&self, update: &ProfileUpdate, now_micros: u64) -> Self {
        let mut record = self.clone();
        if let Some(v) = &update.first_name {
            record.first_name = v.clone();
        }
        if let Some(v) = &update.last_name {
            record.last_name = v.clone();
        }
        if let Some(v) = &update.phone_number {
            record.phone_number = v.clone();
        }
        if let Some(v) = &update.city {
            record.city = v.clone();
        }
        if let Some(v) = &update.pincode {
            record.pincode = v.clone();
        }
        record.updated_at_micros = now_micros;
        record
    }
}

/// Typed partial update: the enumerated set of writable profile fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
}

impl ProfileUpdate {
    /// True when no field is present
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone_number.is_none()
            && self.city.is_none()
            && self.pincode.is_none()
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
