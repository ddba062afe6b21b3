//! CRUD operations for [`Student`] records.
//!
//! All helpers take a `&Connection` so they compose both standalone and
//! inside [`crate::Database::transaction`] closures.

use rusqlite::{params, Connection};
use uuid::Uuid;

use tandem_shared::PartnershipStatus;

use crate::convert;
use crate::error::{Result, StoreError};
use crate::models::Student;

/// Insert a new student.
pub fn insert(conn: &Connection, student: &Student) -> Result<()> {
    conn.execute(
        "INSERT INTO students (id, display_name, partner_id, partnership_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            student.id.to_string(),
            student.display_name,
            student.partner_id.map(|p| p.to_string()),
            student.partnership_status.as_str(),
            student.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Fetch a single student by UUID.
pub fn get(conn: &Connection, id: Uuid) -> Result<Student> {
    conn.query_row(
        "SELECT id, display_name, partner_id, partnership_status, created_at
         FROM students
         WHERE id = ?1",
        params![id.to_string()],
        row_to_student,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

/// Write `partner_id` and `partnership_status` as one unit.
///
/// `Some(partner)` pairs the student, `None` resets it to unpaired. Writing
/// both columns in a single statement is what keeps the
/// "partner set iff paired" invariant from ever tearing.
pub fn set_partnership(conn: &Connection, id: Uuid, partner: Option<Uuid>) -> Result<()> {
    let status = if partner.is_some() {
        PartnershipStatus::Paired
    } else {
        PartnershipStatus::None
    };

    let affected = conn.execute(
        "UPDATE students SET partner_id = ?2, partnership_status = ?3 WHERE id = ?1",
        params![
            id.to_string(),
            partner.map(|p| p.to_string()),
            status.as_str(),
        ],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Student`].
fn row_to_student(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    let id_str: String = row.get(0)?;
    let display_name: String = row.get(1)?;
    let partner_str: Option<String> = row.get(2)?;
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    Ok(Student {
        id: convert::uuid_col(0, &id_str)?,
        display_name,
        partner_id: convert::opt_uuid_col(2, partner_str)?,
        partnership_status: convert::enum_col(3, &status_str)?,
        created_at: convert::ts_col(4, &created_str)?,
    })
}
