//! HTTP surface over the partnership engine.
//!
//! Handlers are deliberately thin: parse the caller identity, hand validated
//! identifiers to the engine, wrap the outcome in the response envelope.
//! Every business rule lives behind [`PartnershipEngine`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use tandem_engine::PartnershipEngine;
use tandem_shared::{CallerIdentity, RequestAction, RequestDirection, Role};

use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PartnershipEngine>,
    pub rate_limiter: RateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    // Only creation is rate-limited; responses and cancellations must stay
    // reachable for callers who already burned their window creating.
    let create = post(create_request).layer(middleware::from_fn_with_state(
        state.rate_limiter.clone(),
        rate_limit_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .route("/partnerships/requests", create)
        .route("/partnerships/requests/{id}/respond", post(respond_to_request))
        .route("/partnerships/requests/{id}/cancel", post(cancel_request))
        .route("/partnerships/requests/{id}", get(list_requests))
        .route("/partnerships/unpair", post(unpair))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request/response bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateRequestBody {
    requester_id: Uuid,
    target_id: Uuid,
    project_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct RespondBody {
    action: RequestAction,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnpairBody {
    Students { party_a: Uuid, party_b: Uuid },
    Project { project_id: Uuid },
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    direction: RequestDirection,
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<Value> {
    ok(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn create_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Result<Json<Value>, ServerError> {
    let caller = caller_identity(&headers)?;
    if body.requester_id != caller.id {
        return Err(ServerError::IdentityMismatch);
    }

    let request_id = state
        .engine
        .create_request(body.requester_id, body.target_id, body.project_id)
        .await?;
    Ok(ok(json!({ "request_id": request_id })))
}

async fn respond_to_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<RespondBody>,
) -> Result<Json<Value>, ServerError> {
    let caller = caller_identity(&headers)?;
    state
        .engine
        .respond_to_request(id, caller.id, body.action)
        .await?;
    Ok(ok(json!({ "request_id": id, "action": body.action })))
}

async fn cancel_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ServerError> {
    let caller = caller_identity(&headers)?;
    state.engine.cancel_request(id, caller.id).await?;
    Ok(ok(json!({ "request_id": id, "cancelled": true })))
}

async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(party_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ServerError> {
    let caller = caller_identity(&headers)?;
    if party_id != caller.id {
        return Err(ServerError::IdentityMismatch);
    }

    let requests = state.engine.list_requests(party_id, query.direction).await?;
    Ok(ok(json!({ "requests": requests })))
}

async fn unpair(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UnpairBody>,
) -> Result<Json<Value>, ServerError> {
    let caller = caller_identity(&headers)?;

    match body {
        UnpairBody::Students { party_a, party_b } => {
            if caller.id != party_a && caller.id != party_b {
                return Err(ServerError::IdentityMismatch);
            }
            state.engine.unpair_students(party_a, party_b).await?;
            info!(%party_a, %party_b, caller = %caller.id, "unpair requested via API");
            Ok(ok(json!({ "unpaired": true })))
        }
        UnpairBody::Project { project_id } => {
            if caller.role != Role::Supervisor {
                return Err(ServerError::IdentityMismatch);
            }
            state.engine.unpair_project(project_id).await?;
            info!(%project_id, caller = %caller.id, "project unpair requested via API");
            Ok(ok(json!({ "unpaired": true })))
        }
    }
}

/// Parse the verified-upstream identity headers.
fn caller_identity(headers: &HeaderMap) -> Result<CallerIdentity, ServerError> {
    let id = headers
        .get(CALLER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::MissingIdentity)?;
    let role = headers
        .get(CALLER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::MissingIdentity)?;

    let id = id
        .parse::<Uuid>()
        .map_err(|e| ServerError::InvalidIdentity(e.to_string()))?;
    let role = role
        .parse::<Role>()
        .map_err(|e| ServerError::InvalidIdentity(e.to_string()))?;

    Ok(CallerIdentity { id, role })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
