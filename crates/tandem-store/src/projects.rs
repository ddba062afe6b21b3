//! CRUD operations for [`Project`] records.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert;
use crate::error::{Result, StoreError};
use crate::models::Project;

/// Insert a new project.
pub fn insert(conn: &Connection, project: &Project) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (id, title, supervisor_id, co_supervisor_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            project.id.to_string(),
            project.title,
            project.supervisor_id.to_string(),
            project.co_supervisor_id.map(|s| s.to_string()),
            project.status.as_str(),
            project.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Fetch a single project by UUID.
pub fn get(conn: &Connection, id: Uuid) -> Result<Project> {
    conn.query_row(
        "SELECT id, title, supervisor_id, co_supervisor_id, status, created_at
         FROM projects
         WHERE id = ?1",
        params![id.to_string()],
        row_to_project,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

/// Set or clear the co-supervisor slot.
///
/// Capacity bookkeeping is the capacity coordinator's job; this helper only
/// writes the slot.
pub fn set_co_supervisor(conn: &Connection, id: Uuid, co_supervisor: Option<Uuid>) -> Result<()> {
    let affected = conn.execute(
        "UPDATE projects SET co_supervisor_id = ?2 WHERE id = ?1",
        params![id.to_string(), co_supervisor.map(|s| s.to_string())],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Project`].
fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let supervisor_str: String = row.get(2)?;
    let co_supervisor_str: Option<String> = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    Ok(Project {
        id: convert::uuid_col(0, &id_str)?,
        title,
        supervisor_id: convert::uuid_col(2, &supervisor_str)?,
        co_supervisor_id: convert::opt_uuid_col(3, co_supervisor_str)?,
        status: convert::enum_col(4, &status_str)?,
        created_at: convert::ts_col(5, &created_str)?,
    })
}
