//! # tandem-server
//!
//! HTTP server for the partnership matching engine.
//!
//! This binary provides:
//! - **REST API** (axum) over the workflow engine: create / respond / cancel
//!   partnership requests, list a party's requests, dissolve partnerships
//! - **Per-caller rate limiting** (sliding window) on request creation
//! - **SQLite persistence** through the store crate

mod api;
mod config;
mod error;
mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_engine::PartnershipEngine;
use tandem_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::{FailureMode, RateLimiter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tandem_server=debug")),
        )
        .init();

    info!("Starting Tandem server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.db_path)?;
    let engine = Arc::new(PartnershipEngine::new(db));

    let failure_mode = if config.rate_limit_fail_closed {
        FailureMode::Closed
    } else {
        FailureMode::Open
    };
    let rate_limiter = RateLimiter::new(
        config.rate_limit_window,
        config.rate_limit_max,
        failure_mode,
    );

    let app_state = AppState {
        engine,
        rate_limiter: rate_limiter.clone(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic limiter cleanup (every 5 minutes, evict windows idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(Duration::from_secs(600));
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
