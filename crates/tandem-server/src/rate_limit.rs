//! Per-caller sliding-window rate limiting.
//!
//! Each `(caller, endpoint)` pair gets a window: the first request in a
//! window stamps its start and counts from one; subsequent requests increment
//! the counter until `max_requests`, and a request after the window has
//! elapsed starts a fresh one. Only the request-creation route sits behind
//! the limiter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::api::CALLER_ID_HEADER;

/// What to do when the limiter itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Let the request through. Default: a limiter outage must not block
    /// matching traffic.
    Open,
    /// Reject the request as rate-limited.
    Closed,
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    /// Requests left in the current window (0 when denied).
    pub remaining: u32,
    /// Seconds until the current window expires. Only meaningful when denied.
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<(String, &'static str), Window>>>,
    window: Duration,
    max_requests: u32,
    failure_mode: FailureMode,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32, failure_mode: FailureMode) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests,
            failure_mode,
        }
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Check and consume one unit for `(caller, endpoint)`.
    ///
    /// Errors only when the limiter state is unusable (poisoned lock); the
    /// middleware turns that into the configured failure mode.
    pub fn check(&self, caller: &str, endpoint: &'static str) -> Result<Decision, LimiterPoisoned> {
        self.check_at(caller, endpoint, Instant::now())
    }

    fn check_at(
        &self,
        caller: &str,
        endpoint: &'static str,
        now: Instant,
    ) -> Result<Decision, LimiterPoisoned> {
        let mut windows = self.windows.lock().map_err(|_| LimiterPoisoned)?;
        let entry = windows
            .entry((caller.to_string(), endpoint))
            .or_insert(Window {
                started: now,
                count: 0,
            });

        // Expired window: start over.
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed);
            return Ok(Decision {
                allowed: false,
                remaining: 0,
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        entry.count += 1;
        Ok(Decision {
            allowed: true,
            remaining: self.max_requests - entry.count,
            retry_after_secs: 0,
        })
    }

    /// Drop windows idle longer than `max_idle`.
    pub fn purge_stale(&self, max_idle: Duration) {
        let now = Instant::now();
        if let Ok(mut windows) = self.windows.lock() {
            windows.retain(|_, w| now.duration_since(w.started) < max_idle);
        }
    }
}

/// The limiter's shared state was poisoned by a panicking holder.
#[derive(Debug, thiserror::Error)]
#[error("rate limiter state unavailable")]
pub struct LimiterPoisoned;

/// Middleware guarding the request-creation route.
///
/// Keyed by the caller-id header; requests without one pass through and are
/// rejected by the handler's identity check instead.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(caller) = req
        .headers()
        .get(CALLER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    else {
        return next.run(req).await;
    };

    match limiter.check(&caller, "create_request") {
        Ok(decision) if decision.allowed => next.run(req).await,
        Ok(decision) => {
            warn!(caller = %caller, "Rate limit exceeded");
            rejected(decision.retry_after_secs)
        }
        Err(e) => match limiter.failure_mode() {
            FailureMode::Open => {
                warn!(error = %e, "Rate limiter failed, letting request through");
                next.run(req).await
            }
            FailureMode::Closed => {
                warn!(error = %e, "Rate limiter failed, rejecting request");
                rejected(1)
            }
        },
    }
}

fn rejected(retry_after_secs: u64) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": "Too many requests; slow down",
    });
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("retry-after", retry_after_secs.to_string())],
        axum::Json(body),
    )
        .into_response()
}
