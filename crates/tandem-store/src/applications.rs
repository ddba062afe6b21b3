//! CRUD operations for [`Application`] records.
//!
//! The interesting helper is [`clear_partner_batch`]: when a partnership
//! ends, approved applications that still reference the prior partner are
//! flipped back to solo in batches no larger than the store's per-batch
//! write cap. Callers loop until a batch comes back empty.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert;
use crate::error::{Result, StoreError};
use crate::models::Application;

/// Insert a new application.
pub fn insert(conn: &Connection, application: &Application) -> Result<()> {
    conn.execute(
        "INSERT INTO applications
         (id, student_id, project_id, partner_id, has_partner, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            application.id.to_string(),
            application.student_id.to_string(),
            application.project_id.to_string(),
            application.partner_id.map(|p| p.to_string()),
            application.has_partner,
            application.status.as_str(),
            application.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Fetch a single application by UUID.
pub fn get(conn: &Connection, id: Uuid) -> Result<Application> {
    conn.query_row(
        "SELECT id, student_id, project_id, partner_id, has_partner, status, created_at
         FROM applications
         WHERE id = ?1",
        params![id.to_string()],
        row_to_application,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

/// Mark an application as approved.
pub fn approve(conn: &Connection, id: Uuid) -> Result<()> {
    let affected = conn.execute(
        "UPDATE applications SET status = 'approved' WHERE id = ?1",
        params![id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Clear the partner reference on up to `limit` of a student's approved
/// applications that name `partner_id`. Returns the number of rows updated;
/// zero means the caller's chunked loop is done.
pub fn clear_partner_batch(
    conn: &Connection,
    student_id: Uuid,
    partner_id: Uuid,
    limit: usize,
) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE applications
         SET has_partner = 0, partner_id = NULL
         WHERE id IN (
             SELECT id FROM applications
             WHERE student_id = ?1
               AND partner_id = ?2
               AND status = 'approved'
               AND has_partner = 1
             LIMIT ?3
         )",
        params![student_id.to_string(), partner_id.to_string(), limit as i64],
    )?;
    Ok(affected)
}

/// Map a `rusqlite::Row` to an [`Application`].
fn row_to_application(row: &rusqlite::Row<'_>) -> rusqlite::Result<Application> {
    let id_str: String = row.get(0)?;
    let student_str: String = row.get(1)?;
    let project_str: String = row.get(2)?;
    let partner_str: Option<String> = row.get(3)?;
    let has_partner: bool = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(Application {
        id: convert::uuid_col(0, &id_str)?,
        student_id: convert::uuid_col(1, &student_str)?,
        project_id: convert::uuid_col(2, &project_str)?,
        partner_id: convert::opt_uuid_col(3, partner_str)?,
        has_partner,
        status: convert::enum_col(5, &status_str)?,
        created_at: convert::ts_col(6, &created_str)?,
    })
}
