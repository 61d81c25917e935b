// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile Pipeline daemon (ppd)
//!
//! Serves the intake HTTP API and runs the durable update pipeline.

use pp_adapters::{HttpKeySource, HttpSyncAdapter, JwksVerifier, SyncTargetConfig, VerifierConfig};
use pp_core::{
    AdapterBundle, Engine, EngineConfig, RetryPolicy, SystemClock, WalProfileStore, WalStore,
};
use pp_server::{run_engine, AppState, Config, EngineHandle};
use std::sync::{Arc, Mutex};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.state_dir)?;

    let _log_guard = setup_logging(&config);

    info!(state_dir = %config.state_dir.display(), "starting ppd");
    if config.sync_url.is_none() {
        error!("PP_SYNC_URL is not set; every update will fail its config check");
    }

    // Durable state and adapters
    let wal = Arc::new(Mutex::new(WalStore::open(&config.wal_dir())?));
    let clock = SystemClock;
    let adapters = AdapterBundle {
        profiles: WalProfileStore::new(Arc::clone(&wal), clock.clone()),
        sync: HttpSyncAdapter::new(
            SyncTargetConfig {
                endpoint: config.sync_url.clone(),
                source: config.sync_source.clone(),
                timeout: config.sync_timeout,
            },
            clock.clone(),
        )?,
    };

    let engine_config = EngineConfig {
        sync_delay: config.sync_delay,
        retry: RetryPolicy {
            max_attempts: config.sync_max_attempts,
            ..Default::default()
        },
        retention: config.retention,
    };
    let engine = Engine::new(adapters, wal, clock, engine_config);

    // Engine task owns the WAL and timers; routes reach it by handle
    let (handle, rx) = EngineHandle::channel(64);
    let engine_task = tokio::spawn(run_engine(engine, rx));

    let verifier = JwksVerifier::new(
        HttpKeySource::new(&config.issuer_domain)?,
        VerifierConfig::new(
            format!("https://{}/", config.issuer_domain),
            config.audience.clone(),
        ),
    );
    let app = pp_server::router(AppState { verifier, handle });

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        }
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    engine_task.abort();
    info!("ppd stopped");
    Ok(())
}

fn setup_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.log_path();
    let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let log_file = log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("ppd.log"));
    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    guard
}
