//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tandem_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_RATE_MAX_REQUESTS, DEFAULT_RATE_WINDOW_SECS,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DB_PATH`
    /// Default: `./tandem.db`
    pub db_path: PathBuf,

    /// Maximum request creations per caller per window.
    /// Env: `RATE_LIMIT_MAX`
    /// Default: `20`
    pub rate_limit_max: u32,

    /// Length of the rate-limit window.
    /// Env: `RATE_LIMIT_WINDOW_SECS`
    /// Default: `60`
    pub rate_limit_window: Duration,

    /// Whether a rate-limiter infrastructure failure rejects the request
    /// (fail closed) instead of letting it through (fail open).
    /// Env: `RATE_LIMIT_FAIL_CLOSED` (true/false)
    /// Default: `false` — a limiter outage must not block matching traffic.
    pub rate_limit_fail_closed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: PathBuf::from("./tandem.db"),
            rate_limit_max: DEFAULT_RATE_MAX_REQUESTS,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            rate_limit_fail_closed: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_MAX") {
            if let Ok(n) = val.parse::<u32>() {
                config.rate_limit_max = n;
            } else {
                tracing::warn!(value = %val, "Invalid RATE_LIMIT_MAX, using default");
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_WINDOW_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.rate_limit_window = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid RATE_LIMIT_WINDOW_SECS, using default");
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_FAIL_CLOSED") {
            config.rate_limit_fail_closed = val == "true" || val == "1";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
