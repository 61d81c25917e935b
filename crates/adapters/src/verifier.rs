// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JWKS-backed bearer token verification

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use pp_core::{AuthError, IdentityClaim, TokenVerifier};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from fetching or parsing a key set
#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("jwks fetch failed: {0}")]
    Fetch(String),
    #[error("jwks malformed: {0}")]
    Malformed(String),
}

/// Supplies the current signing keys, indexed by key id
#[async_trait]
pub trait KeySource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<HashMap<String, DecodingKey>, KeySourceError>;
}

/// Fetches the standard JWKS document from an issuer domain
#[derive(Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    pub fn new(issuer_domain: &str) -> Result<Self, KeySourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| KeySourceError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("https://{issuer_domain}/.well-known/jwks.json"),
        })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<HashMap<String, DecodingKey>, KeySourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeySourceError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KeySourceError::Fetch(format!(
                "jwks endpoint returned {}",
                response.status()
            )));
        }
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| KeySourceError::Malformed(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => {
                    tracing::warn!(kid, error = %e, "skipping unusable jwk");
                }
            }
        }
        Ok(keys)
    }
}

/// Verifier configuration: expected issuer, audience, and accepted algorithms
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub issuer: String,
    pub audience: String,
    pub allowed_algs: Vec<Algorithm>,
}

impl VerifierConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            allowed_algs: vec![Algorithm::RS256],
        }
    }

    pub fn with_algorithms(mut self, algs: Vec<Algorithm>) -> Self {
        self.allowed_algs = algs;
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    exp: u64,
}

struct VerifierInner<S> {
    source: S,
    config: VerifierConfig,
    cache: RwLock<HashMap<String, DecodingKey>>,
}

/// Verifies bearer tokens against a cached JWKS key set
///
/// Key rotation produces fresh key ids, so cached keys are never evicted
/// within the process; an unknown kid triggers a single cache refresh.
pub struct JwksVerifier<S> {
    inner: Arc<VerifierInner<S>>,
}

impl<S> Clone for JwksVerifier<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeySource> JwksVerifier<S> {
    pub fn new(source: S, config: VerifierConfig) -> Self {
        Self {
            inner: Arc::new(VerifierInner {
                source,
                config,
                cache: RwLock::new(HashMap::new()),
            }),
        }
    }

    async fn resolve_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.inner.cache.read().await.get(kid) {
            return Ok(key.clone());
        }
        let fresh = self
            .inner
            .source
            .fetch()
            .await
            .map_err(|e| AuthError::invalid(e.to_string()))?;
        let mut cache = self.inner.cache.write().await;
        *cache = fresh;
        cache
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::invalid(format!("unknown signing key: {kid}")))
    }
}

#[async_trait]
impl<S: KeySource> TokenVerifier for JwksVerifier<S> {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::invalid(e.to_string()))?;

        // Algorithm check happens before any key material is touched
        if !self.inner.config.allowed_algs.contains(&header.alg) {
            return Err(AuthError::invalid(format!(
                "algorithm not allowed: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid("token missing kid"))?;
        let key = self.resolve_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.inner.config.audience]);
        validation.set_issuer(&[&self.inner.config.issuer]);

        let data = decode::<TokenClaims>(token, &key, &validation)
            .map_err(|e| AuthError::invalid(e.to_string()))?;

        Ok(IdentityClaim {
            subject: data.claims.sub,
            email: data.claims.email,
            given_name: data.claims.given_name,
            family_name: data.claims.family_name,
            expires_at: data.claims.exp,
        })
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
