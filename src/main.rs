// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Form Intake Service
//!
//! ## Configuration
//!
//! Settings come from an optional `form-intake.{toml,yaml,json}` file and
//! `INTAKE__*` environment variables (a `.env` file is honoured), e.g.:
//!
//! - `INTAKE__BIND_ADDR`: server bind address (default: 0.0.0.0:8080)
//! - `INTAKE__ENDPOINTS_FILE`: JSON array of endpoint definitions
//! - `INTAKE__RATE_LIMIT__PUBLIC__BURST`: public submissions per window (default: 100)
//! - `INTAKE__SPAM__SCORE_THRESHOLD`: spam cut-off (default: 50)
//! - `INTAKE__WEBHOOK__MAX_ATTEMPTS`: delivery attempts (default: 3)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use form_intake::{config::Config, create_router, AppState, MemoryStore};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        public_burst = config.rate_limit.public.burst,
        auth_burst = config.rate_limit.auth.burst,
        api_burst = config.rate_limit.api.burst,
        spam_threshold = config.spam.score_threshold,
        webhook_attempts = config.webhook.max_attempts,
        "Starting form intake"
    );

    let store = Arc::new(match &config.endpoints_file {
        Some(path) => MemoryStore::from_file(path)?,
        None => MemoryStore::new(),
    });

    let addr: SocketAddr = config.bind_addr.parse()?;
    let sweep_interval = config.rate_limit.sweep_interval();
    let (state, pool) = AppState::build(config, store)?;

    let mut sweepers = state.limiters.spawn_sweepers(sweep_interval);
    sweepers.push(state.ingest.scorer().tracker().spawn_sweeper(sweep_interval));

    let app = create_router(Arc::clone(&state));
    drop(state);

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router held the last queue sender; workers now finish what is queued.
    for sweeper in sweepers {
        sweeper.abort();
    }
    pool.join(DRAIN_TIMEOUT).await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
