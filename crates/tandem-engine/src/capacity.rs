//! Capacity coordination for co-supervised projects.
//!
//! A project's `co_supervisor_id` slot and the co-supervisor's
//! `current_capacity` counter form one consistent unit. Both helpers here
//! operate on an open transaction, so the two fields can never be observed
//! torn: either the slot is set and the unit of capacity consumed, or
//! neither.

use rusqlite::Transaction;
use uuid::Uuid;

use tandem_store::{projects, supervisors, StoreError};

use crate::error::{EngineError, Result};

/// Attach `supervisor_id` as co-supervisor of `project_id`, consuming one
/// unit of that supervisor's capacity.
///
/// Fails with a conflict error when the slot is already occupied or the
/// supervisor is at `max_capacity`; the capacity check is a guarded UPDATE,
/// so a racing transaction cannot push the counter past the limit.
pub fn attach(tx: &Transaction<'_>, project_id: Uuid, supervisor_id: Uuid) -> Result<()> {
    let project = projects::get(tx, project_id).map_err(|e| match e {
        StoreError::NotFound => EngineError::ProjectNotFound(project_id),
        other => EngineError::from(other),
    })?;
    if project.co_supervisor_id.is_some() {
        return Err(EngineError::CoSupervisorTaken(project_id));
    }

    // Existence check first: the guarded UPDATE below cannot tell a missing
    // row from an exhausted one.
    supervisors::get(tx, supervisor_id).map_err(|e| match e {
        StoreError::NotFound => EngineError::SupervisorNotFound(supervisor_id),
        other => EngineError::from(other),
    })?;
    if !supervisors::increment_capacity_if_available(tx, supervisor_id)? {
        return Err(EngineError::CapacityExhausted(supervisor_id));
    }
    projects::set_co_supervisor(tx, project_id, Some(supervisor_id))?;

    tracing::debug!(%project_id, %supervisor_id, "co-supervisor attached");
    Ok(())
}

/// Detach the co-supervisor from `project_id`, releasing one unit of
/// capacity.
///
/// Idempotent: a project without a co-supervisor is a no-op. Invoked both
/// for explicit unpairing and for project-completion cleanup.
pub fn detach(tx: &Transaction<'_>, project_id: Uuid) -> Result<()> {
    let project = projects::get(tx, project_id).map_err(|e| match e {
        StoreError::NotFound => EngineError::ProjectNotFound(project_id),
        other => EngineError::from(other),
    })?;
    let Some(co_supervisor_id) = project.co_supervisor_id else {
        return Ok(());
    };

    projects::set_co_supervisor(tx, project_id, None)?;
    supervisors::decrement_capacity(tx, co_supervisor_id)?;

    tracing::debug!(%project_id, %co_supervisor_id, "co-supervisor detached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_store::{Database, Project, Supervisor};

    fn seeded_db(max_capacity: u32) -> (Database, Project, Supervisor) {
        let db = Database::open_in_memory().unwrap();
        let owner = Supervisor::new("Dr. Kay", 3);
        let co = Supervisor::new("Dr. Lin", max_capacity);
        supervisors::insert(db.conn(), &owner).unwrap();
        supervisors::insert(db.conn(), &co).unwrap();

        let project = Project::new("Compiler testbed", owner.id);
        projects::insert(db.conn(), &project).unwrap();

        (db, project, co)
    }

    #[test]
    fn attach_sets_slot_and_consumes_capacity() {
        let (mut db, project, co) = seeded_db(2);

        db.transaction(|tx| attach(tx, project.id, co.id)).unwrap();

        let loaded = projects::get(db.conn(), project.id).unwrap();
        assert_eq!(loaded.co_supervisor_id, Some(co.id));
        let loaded_co = supervisors::get(db.conn(), co.id).unwrap();
        assert_eq!(loaded_co.current_capacity, 1);
    }

    #[test]
    fn attach_refuses_occupied_slot() {
        let (mut db, project, co) = seeded_db(2);
        db.transaction(|tx| attach(tx, project.id, co.id)).unwrap();

        let result = db.transaction(|tx| attach(tx, project.id, co.id));
        assert!(matches!(result, Err(EngineError::CoSupervisorTaken(_))));
        // The failed attach must not have consumed capacity.
        assert_eq!(
            supervisors::get(db.conn(), co.id).unwrap().current_capacity,
            1
        );
    }

    #[test]
    fn attach_refuses_exhausted_capacity() {
        let (mut db, project, co) = seeded_db(0);

        let result = db.transaction(|tx| attach(tx, project.id, co.id));
        assert!(matches!(result, Err(EngineError::CapacityExhausted(_))));
        assert_eq!(
            projects::get(db.conn(), project.id).unwrap().co_supervisor_id,
            None
        );
    }

    #[test]
    fn detach_releases_slot_and_capacity() {
        let (mut db, project, co) = seeded_db(2);
        db.transaction(|tx| attach(tx, project.id, co.id)).unwrap();

        db.transaction(|tx| detach(tx, project.id)).unwrap();

        assert_eq!(
            projects::get(db.conn(), project.id).unwrap().co_supervisor_id,
            None
        );
        assert_eq!(
            supervisors::get(db.conn(), co.id).unwrap().current_capacity,
            0
        );
    }

    #[test]
    fn detach_is_idempotent() {
        let (mut db, project, co) = seeded_db(2);
        db.transaction(|tx| attach(tx, project.id, co.id)).unwrap();

        db.transaction(|tx| detach(tx, project.id)).unwrap();
        db.transaction(|tx| detach(tx, project.id)).unwrap();

        // Capacity released exactly once.
        assert_eq!(
            supervisors::get(db.conn(), co.id).unwrap().current_capacity,
            0
        );
    }
}
