// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use pp_core::FakeClock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the stub server should answer for PUT requests
#[derive(Clone, Copy)]
enum PutBehavior {
    Ok,
    NotFound,
    ServerError,
}

#[derive(Clone)]
struct StubState {
    put_behavior: PutBehavior,
    post_status: StatusCode,
    puts: Arc<AtomicUsize>,
    posts: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<serde_json::Value>>>,
}

async fn spawn_stub(put_behavior: PutBehavior, post_status: StatusCode) -> (SocketAddr, StubState) {
    let state = StubState {
        put_behavior,
        post_status,
        puts: Arc::new(AtomicUsize::new(0)),
        posts: Arc::new(AtomicUsize::new(0)),
        last_body: Arc::new(Mutex::new(None)),
    };

    let app = Router::new()
        .route(
            "/profiles/:subject",
            put(
                |State(s): State<StubState>,
                 Path(_subject): Path<String>,
                 Json(body): Json<serde_json::Value>| async move {
                    s.puts.fetch_add(1, Ordering::SeqCst);
                    *s.last_body.lock().unwrap() = Some(body);
                    match s.put_behavior {
                        PutBehavior::Ok => StatusCode::OK,
                        PutBehavior::NotFound => StatusCode::NOT_FOUND,
                        PutBehavior::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
                    }
                },
            ),
        )
        .route(
            "/profiles",
            post(
                |State(s): State<StubState>, Json(body): Json<serde_json::Value>| async move {
                    s.posts.fetch_add(1, Ordering::SeqCst);
                    *s.last_body.lock().unwrap() = Some(body);
                    s.post_status
                },
            ),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn adapter_for(addr: SocketAddr) -> HttpSyncAdapter<FakeClock> {
    let config = SyncTargetConfig {
        endpoint: Some(format!("http://{addr}/profiles")),
        source: "profile-pipeline".to_string(),
        timeout: Duration::from_secs(2),
    };
    HttpSyncAdapter::new(config, FakeClock::new()).unwrap()
}

fn record() -> ProfileRecord {
    ProfileRecord {
        subject_id: "auth0|user-1".to_string(),
        email: "ana@example.com".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Costa".to_string(),
        phone_number: String::new(),
        city: "Lisbon".to_string(),
        pincode: "1100-048".to_string(),
        created_at_micros: 1,
        updated_at_micros: 2,
    }
}

#[tokio::test]
async fn successful_update_sends_camel_case_payload() {
    let (addr, state) = spawn_stub(PutBehavior::Ok, StatusCode::CREATED).await;
    let adapter = adapter_for(addr);

    adapter.sync("auth0|user-1", &record()).await.unwrap();

    assert_eq!(state.puts.load(Ordering::SeqCst), 1);
    assert_eq!(state.posts.load(Ordering::SeqCst), 0);

    let body = state.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["subjectId"], "auth0|user-1");
    assert_eq!(body["firstName"], "Ana");
    assert_eq!(body["city"], "Lisbon");
    assert_eq!(body["source"], "profile-pipeline");
    assert!(body["syncedAtMicros"].as_u64().unwrap() > 0);
    // Empty fields are omitted entirely
    assert!(body.get("phoneNumber").is_none());
}

#[tokio::test]
async fn not_found_falls_back_to_create() {
    let (addr, state) = spawn_stub(PutBehavior::NotFound, StatusCode::CREATED).await;
    let adapter = adapter_for(addr);

    adapter.sync("auth0|user-1", &record()).await.unwrap();

    assert_eq!(state.puts.load(Ordering::SeqCst), 1);
    assert_eq!(state.posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_create_after_not_found_is_transient() {
    let (addr, state) = spawn_stub(PutBehavior::NotFound, StatusCode::BAD_GATEWAY).await;
    let adapter = adapter_for(addr);

    let err = adapter.sync("auth0|user-1", &record()).await.unwrap_err();

    assert!(err.is_transient());
    assert_eq!(state.posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_error_is_transient() {
    let (addr, _state) = spawn_stub(PutBehavior::ServerError, StatusCode::OK).await;
    let adapter = adapter_for(addr);

    let err = adapter.sync("auth0|user-1", &record()).await.unwrap_err();

    assert!(err.is_transient());
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    // Bind a listener to reserve an address, then drop it before connecting
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let adapter = adapter_for(addr);
    let err = adapter.sync("auth0|user-1", &record()).await.unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn missing_endpoint_is_fatal() {
    let adapter = HttpSyncAdapter::new(SyncTargetConfig::default(), FakeClock::new()).unwrap();

    assert!(matches!(
        adapter.check_config(),
        Err(SyncError::Fatal(_))
    ));
    assert!(matches!(
        adapter.sync("auth0|user-1", &record()).await,
        Err(SyncError::Fatal(_))
    ));
}

#[tokio::test]
async fn configured_endpoint_passes_config_check() {
    let (addr, _state) = spawn_stub(PutBehavior::Ok, StatusCode::OK).await;
    adapter_for(addr).check_config().unwrap();
}
