//! CRUD and indexed lookup for [`PartnershipRequest`] records.
//!
//! This is a pure persistence facade: no business rules live here, so the
//! workflow engine can be exercised against an in-memory database. Requests
//! are an append-only audit trail; the only mutation is the guarded status
//! transition in [`update_status_if_pending`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use tandem_shared::{RequestDirection, RequestStatus};

use crate::convert;
use crate::error::{Result, StoreError};
use crate::models::PartnershipRequest;

const COLUMNS: &str =
    "id, kind, requester_id, target_id, project_id, status, created_at, responded_at";

/// Insert a new request.
pub fn insert(conn: &Connection, request: &PartnershipRequest) -> Result<()> {
    conn.execute(
        "INSERT INTO partnership_requests
         (id, kind, requester_id, target_id, project_id, status, created_at, responded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            request.id.to_string(),
            request.kind.as_str(),
            request.requester_id.to_string(),
            request.target_id.to_string(),
            request.project_id.map(|p| p.to_string()),
            request.status.as_str(),
            request.created_at.to_rfc3339(),
            request.responded_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

/// Fetch a single request by UUID.
pub fn get(conn: &Connection, id: Uuid) -> Result<PartnershipRequest> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM partnership_requests WHERE id = ?1"),
        params![id.to_string()],
        row_to_request,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

/// Find a pending request between two parties, in either direction.
///
/// `project_id` scopes the lookup for supervisor requests; `None` matches
/// only student requests. The caller inspects `requester_id` on the result
/// to tell "you already requested them" from "they already requested you".
pub fn find_pending_between(
    conn: &Connection,
    a: Uuid,
    b: Uuid,
    project_id: Option<Uuid>,
) -> Result<Option<PartnershipRequest>> {
    let mut found = Vec::new();
    match project_id {
        Some(project) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM partnership_requests
                 WHERE status = 'pending'
                   AND project_id = ?3
                   AND ((requester_id = ?1 AND target_id = ?2)
                     OR (requester_id = ?2 AND target_id = ?1))
                 LIMIT 1"
            ))?;
            let rows = stmt.query_map(
                params![a.to_string(), b.to_string(), project.to_string()],
                row_to_request,
            )?;
            for row in rows {
                found.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM partnership_requests
                 WHERE status = 'pending'
                   AND project_id IS NULL
                   AND ((requester_id = ?1 AND target_id = ?2)
                     OR (requester_id = ?2 AND target_id = ?1))
                 LIMIT 1"
            ))?;
            let rows = stmt.query_map(params![a.to_string(), b.to_string()], row_to_request)?;
            for row in rows {
                found.push(row?);
            }
        }
    }
    Ok(found.pop())
}

/// List pending requests touching a party, filtered by direction.
pub fn find_pending_for_party(
    conn: &Connection,
    party_id: Uuid,
    direction: RequestDirection,
) -> Result<Vec<PartnershipRequest>> {
    query_for_party(conn, party_id, direction, true)
}

/// List all requests touching a party (any status), filtered by direction,
/// newest first.
pub fn list_for_party(
    conn: &Connection,
    party_id: Uuid,
    direction: RequestDirection,
) -> Result<Vec<PartnershipRequest>> {
    query_for_party(conn, party_id, direction, false)
}

/// List pending requests scoped to a project.
pub fn find_pending_for_project(
    conn: &Connection,
    project_id: Uuid,
) -> Result<Vec<PartnershipRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM partnership_requests
         WHERE project_id = ?1 AND status = 'pending'
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![project_id.to_string()], row_to_request)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(row?);
    }
    Ok(requests)
}

/// Transition a request out of `pending`, but only if it still is pending.
///
/// Returns `true` when the row was updated. Under concurrent responders this
/// is the idempotency primitive: exactly one caller observes `true`, every
/// other observes `false` and reports the request as already processed.
pub fn update_status_if_pending(
    conn: &Connection,
    id: Uuid,
    status: RequestStatus,
    responded_at: Option<DateTime<Utc>>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE partnership_requests
         SET status = ?2, responded_at = ?3
         WHERE id = ?1 AND status = 'pending'",
        params![
            id.to_string(),
            status.as_str(),
            responded_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(affected > 0)
}

fn query_for_party(
    conn: &Connection,
    party_id: Uuid,
    direction: RequestDirection,
    pending_only: bool,
) -> Result<Vec<PartnershipRequest>> {
    let direction_clause = match direction {
        RequestDirection::Incoming => "target_id = ?1",
        RequestDirection::Outgoing => "requester_id = ?1",
        RequestDirection::All => "(requester_id = ?1 OR target_id = ?1)",
    };
    let status_clause = if pending_only {
        " AND status = 'pending'"
    } else {
        ""
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM partnership_requests
         WHERE {direction_clause}{status_clause}
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![party_id.to_string()], row_to_request)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(row?);
    }
    Ok(requests)
}

/// Map a `rusqlite::Row` to a [`PartnershipRequest`].
fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartnershipRequest> {
    let id_str: String = row.get(0)?;
    let kind_str: String = row.get(1)?;
    let requester_str: String = row.get(2)?;
    let target_str: String = row.get(3)?;
    let project_str: Option<String> = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;
    let responded_str: Option<String> = row.get(7)?;

    Ok(PartnershipRequest {
        id: convert::uuid_col(0, &id_str)?,
        kind: convert::enum_col(1, &kind_str)?,
        requester_id: convert::uuid_col(2, &requester_str)?,
        target_id: convert::uuid_col(3, &target_str)?,
        project_id: convert::opt_uuid_col(4, project_str)?,
        status: convert::enum_col(5, &status_str)?,
        created_at: convert::ts_col(6, &created_str)?,
        responded_at: convert::opt_ts_col(7, responded_str)?,
    })
}
