//! CRUD operations for [`Supervisor`] records.
//!
//! Capacity mutations are guarded UPDATEs: the `current_capacity <
//! max_capacity` check lives in the statement itself so the invariant holds
//! even when two transactions race on the same row.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert;
use crate::error::{Result, StoreError};
use crate::models::Supervisor;

/// Insert a new supervisor.
pub fn insert(conn: &Connection, supervisor: &Supervisor) -> Result<()> {
    conn.execute(
        "INSERT INTO supervisors
         (id, display_name, max_capacity, current_capacity, is_active, is_approved, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            supervisor.id.to_string(),
            supervisor.display_name,
            supervisor.max_capacity,
            supervisor.current_capacity,
            supervisor.is_active,
            supervisor.is_approved,
            supervisor.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Fetch a single supervisor by UUID.
pub fn get(conn: &Connection, id: Uuid) -> Result<Supervisor> {
    conn.query_row(
        "SELECT id, display_name, max_capacity, current_capacity, is_active, is_approved, created_at
         FROM supervisors
         WHERE id = ?1",
        params![id.to_string()],
        row_to_supervisor,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

/// Consume one unit of capacity if any is free.
///
/// Returns `false` when the supervisor is already at `max_capacity` (or the
/// row does not exist -- callers verify existence first).
pub fn increment_capacity_if_available(conn: &Connection, id: Uuid) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE supervisors
         SET current_capacity = current_capacity + 1
         WHERE id = ?1 AND current_capacity < max_capacity",
        params![id.to_string()],
    )?;
    Ok(affected > 0)
}

/// Release one unit of capacity, floored at zero.
pub fn decrement_capacity(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute(
        "UPDATE supervisors
         SET current_capacity = current_capacity - 1
         WHERE id = ?1 AND current_capacity > 0",
        params![id.to_string()],
    )?;
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Supervisor`].
fn row_to_supervisor(row: &rusqlite::Row<'_>) -> rusqlite::Result<Supervisor> {
    let id_str: String = row.get(0)?;
    let display_name: String = row.get(1)?;
    let max_capacity: u32 = row.get(2)?;
    let current_capacity: u32 = row.get(3)?;
    let is_active: bool = row.get(4)?;
    let is_approved: bool = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(Supervisor {
        id: convert::uuid_col(0, &id_str)?,
        display_name,
        max_capacity,
        current_capacity,
        is_active,
        is_approved,
        created_at: convert::ts_col(6, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn capacity_increment_is_guarded() {
        let db = Database::open_in_memory().unwrap();
        let supervisor = Supervisor::new("Dr. Kay", 2);
        insert(db.conn(), &supervisor).unwrap();

        assert!(increment_capacity_if_available(db.conn(), supervisor.id).unwrap());
        assert!(increment_capacity_if_available(db.conn(), supervisor.id).unwrap());
        // Full: the guarded update must refuse the third unit.
        assert!(!increment_capacity_if_available(db.conn(), supervisor.id).unwrap());

        let loaded = get(db.conn(), supervisor.id).unwrap();
        assert_eq!(loaded.current_capacity, 2);
    }

    #[test]
    fn decrement_floors_at_zero() {
        let db = Database::open_in_memory().unwrap();
        let supervisor = Supervisor::new("Dr. Kay", 1);
        insert(db.conn(), &supervisor).unwrap();

        decrement_capacity(db.conn(), supervisor.id).unwrap();
        let loaded = get(db.conn(), supervisor.id).unwrap();
        assert_eq!(loaded.current_capacity, 0);
    }

    #[test]
    fn missing_supervisor_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            get(db.conn(), Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }
}
