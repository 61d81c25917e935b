// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Intake HTTP surface

use crate::handle::{EngineHandle, HandleError};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pp_core::{AuthError, IdentityClaim, ProfileRecord, ProfileUpdate, TokenVerifier, WorkflowId};
use serde::Serialize;
use serde_json::json;

/// Shared route state: the verifier plus the engine handle
#[derive(Clone)]
pub struct AppState<V> {
    pub verifier: V,
    pub handle: EngineHandle,
}

pub fn router<V: TokenVerifier>(state: AppState<V>) -> Router {
    Router::new()
        .route("/profile", get(get_profile::<V>).put(put_profile::<V>))
        .route("/profile/updates/:id", get(update_status::<V>))
        .route("/healthz", get(healthz))
        .with_state(state)
}

enum ApiError {
    Auth(AuthError),
    NotFound,
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<HandleError> for ApiError {
    fn from(e: HandleError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Auth(e @ AuthError::Missing) => (StatusCode::UNAUTHORIZED, e.to_string()),
            Self::Auth(e @ AuthError::Invalid { .. }) => (StatusCode::FORBIDDEN, e.to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Internal(detail) => {
                tracing::error!(detail, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Profile fields as the API presents them
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    subject_id: String,
    email: String,
    first_name: String,
    last_name: String,
    phone_number: String,
    city: String,
    pincode: String,
    created_at_micros: u64,
    updated_at_micros: u64,
}

impl From<ProfileRecord> for ProfileBody {
    fn from(r: ProfileRecord) -> Self {
        Self {
            subject_id: r.subject_id,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            phone_number: r.phone_number,
            city: r.city,
            pincode: r.pincode,
            created_at_micros: r.created_at_micros,
            updated_at_micros: r.updated_at_micros,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::Missing)
}

async fn authenticate<V: TokenVerifier>(
    verifier: &V,
    headers: &HeaderMap,
) -> Result<IdentityClaim, ApiError> {
    let token = bearer_token(headers)?;
    Ok(verifier.verify(token).await?)
}

async fn get_profile<V: TokenVerifier>(
    State(state): State<AppState<V>>,
    headers: HeaderMap,
) -> Result<Json<ProfileBody>, ApiError> {
    let claim = authenticate(&state.verifier, &headers).await?;
    let record = state.handle.profile(claim).await?;
    Ok(Json(record.into()))
}

async fn put_profile<V: TokenVerifier>(
    State(state): State<AppState<V>>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claim = authenticate(&state.verifier, &headers).await?;
    let workflow_id = state.handle.submit(claim, update).await?;

    // The reply does not wait for the delay or the sync; callers poll
    // the status endpoint with the returned id.
    Ok(Json(json!({
        "message": "Profile update started",
        "workflowId": workflow_id,
        "status": "processing",
    })))
}

async fn update_status<V: TokenVerifier>(
    State(state): State<AppState<V>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claim = authenticate(&state.verifier, &headers).await?;

    let workflow = state
        .handle
        .status(WorkflowId(id))
        .await?
        .ok_or(ApiError::NotFound)?;

    // Workflows are visible only to the subject that submitted them;
    // anything else looks like an unknown id.
    if workflow.subject_id != claim.subject {
        return Err(ApiError::NotFound);
    }

    Ok(Json(json!({
        "workflowId": workflow.id,
        "stage": workflow.stage.name(),
        "error": workflow.error(),
    })))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
