//! The partnership request state machine.
//!
//! [`PartnershipEngine`] owns the store handle and exposes the five
//! operations the surrounding application calls: create, respond, cancel,
//! list, unpair. Each state-changing operation runs cheap pre-checks on a
//! snapshot read, then opens a single transaction that re-reads the
//! authoritative records and re-validates the same preconditions before
//! mutating anything -- closing the time-of-check/time-of-use gap against
//! concurrent writers.
//!
//! Accepting a request additionally triggers best-effort cleanup of sibling
//! pending requests. The cleanup runs after the accept has committed, on a
//! spawned task; its failures are logged and swallowed, and can never undo
//! the committed outcome.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Connection, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use tandem_shared::constants::BATCH_WRITE_LIMIT;
use tandem_shared::{RequestAction, RequestDirection, RequestKind, RequestStatus};
use tandem_store::{
    applications, projects, requests, students, supervisors, Database, PartnershipRequest,
    Project, StoreError, Student, Supervisor,
};

use crate::capacity;
use crate::error::{EngineError, Result};

/// Workflow engine for partnership matching.
///
/// Stateless apart from the injected store handle; construct one at startup
/// and share it behind an `Arc`.
pub struct PartnershipEngine {
    db: Arc<Mutex<Database>>,
}

impl PartnershipEngine {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a pending partnership request.
    ///
    /// Without `project_id` this is a student-to-student request; with it, a
    /// supervisor-to-supervisor co-supervision request for that project.
    /// Returns the new request's id. No party field is mutated at creation
    /// time; pairing state changes only on acceptance.
    pub async fn create_request(
        &self,
        requester_id: Uuid,
        target_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<Uuid> {
        if requester_id == target_id {
            return Err(EngineError::SelfPartnership);
        }

        match project_id {
            None => self.create_student_request(requester_id, target_id).await,
            Some(project_id) => {
                self.create_supervisor_request(requester_id, target_id, project_id)
                    .await
            }
        }
    }

    async fn create_student_request(&self, requester_id: Uuid, target_id: Uuid) -> Result<Uuid> {
        let mut db = self.db.lock().await;

        // Pre-checks on a snapshot; the transaction re-validates below.
        validate_student_create(db.conn(), requester_id, target_id)?;

        let request_id = db.transaction(|tx| {
            validate_student_create(tx, requester_id, target_id)?;

            let request = PartnershipRequest::new_student(requester_id, target_id);
            requests::insert(tx, &request)?;
            Ok::<_, EngineError>(request.id)
        })?;
        drop(db);

        tracing::info!(
            %request_id,
            %requester_id,
            %target_id,
            "student partnership request created"
        );
        Ok(request_id)
    }

    async fn create_supervisor_request(
        &self,
        requester_id: Uuid,
        target_id: Uuid,
        project_id: Uuid,
    ) -> Result<Uuid> {
        let mut db = self.db.lock().await;

        validate_supervisor_create(db.conn(), requester_id, target_id, project_id)?;

        let request_id = db.transaction(|tx| {
            validate_supervisor_create(tx, requester_id, target_id, project_id)?;

            let request = PartnershipRequest::new_supervisor(requester_id, target_id, project_id);
            requests::insert(tx, &request)?;
            Ok::<_, EngineError>(request.id)
        })?;
        drop(db);

        tracing::info!(
            %request_id,
            %requester_id,
            %target_id,
            %project_id,
            "supervisor partnership request created"
        );
        Ok(request_id)
    }

    // ------------------------------------------------------------------
    // Respond
    // ------------------------------------------------------------------

    /// Accept or reject a pending request. Only the request's target may
    /// respond; responding twice yields an "already processed" conflict for
    /// the second caller.
    pub async fn respond_to_request(
        &self,
        request_id: Uuid,
        responder_id: Uuid,
        action: RequestAction,
    ) -> Result<()> {
        let request = {
            let db = self.db.lock().await;
            get_request(db.conn(), request_id)?
        };

        if request.target_id != responder_id {
            return Err(EngineError::NotRequestTarget);
        }
        if request.status != RequestStatus::Pending {
            return Err(EngineError::AlreadyProcessed(request.status));
        }

        match action {
            RequestAction::Reject => {
                self.finish_request(request_id, RequestStatus::Rejected)
                    .await
            }
            RequestAction::Accept => match request.kind {
                RequestKind::Student => self.accept_student_request(&request).await,
                RequestKind::Supervisor => self.accept_supervisor_request(&request).await,
            },
        }
    }

    async fn accept_student_request(&self, request: &PartnershipRequest) -> Result<()> {
        {
            let mut db = self.db.lock().await;
            db.transaction(|tx| {
                // Guarded transition first: a concurrent responder loses here
                // and the whole transaction (including this write) rolls back
                // on any later validation failure.
                claim_pending(tx, request.id, RequestStatus::Accepted)?;

                let requester = get_student(tx, request.requester_id)?;
                let target = get_student(tx, request.target_id)?;
                ensure_unpaired(&requester)?;
                ensure_unpaired(&target)?;

                students::set_partnership(tx, requester.id, Some(target.id))?;
                students::set_partnership(tx, target.id, Some(requester.id))?;
                Ok::<_, EngineError>(())
            })?;
        }

        tracing::info!(
            request_id = %request.id,
            requester_id = %request.requester_id,
            target_id = %request.target_id,
            "student partnership accepted"
        );

        // Post-commit, best-effort: never affects the committed accept.
        let db = self.db.clone();
        let (a, b, accepted_id) = (request.requester_id, request.target_id, request.id);
        tokio::spawn(async move {
            if let Err(e) = Self::cancel_party_siblings(db, a, b, accepted_id).await {
                tracing::warn!(
                    request_id = %accepted_id,
                    error = %e,
                    "sibling request cleanup failed"
                );
            }
        });

        Ok(())
    }

    async fn accept_supervisor_request(&self, request: &PartnershipRequest) -> Result<()> {
        let project_id = request.project_id.ok_or(EngineError::MalformedRequest)?;

        {
            let mut db = self.db.lock().await;
            db.transaction(|tx| {
                claim_pending(tx, request.id, RequestStatus::Accepted)?;

                let target = get_supervisor(tx, request.target_id)?;
                ensure_available(&target)?;
                // Slot occupancy and capacity are re-checked in here, against
                // the freshly-read rows.
                capacity::attach(tx, project_id, target.id)?;
                Ok::<_, EngineError>(())
            })?;
        }

        tracing::info!(
            request_id = %request.id,
            %project_id,
            co_supervisor_id = %request.target_id,
            "co-supervision accepted"
        );

        let db = self.db.clone();
        let accepted_id = request.id;
        tokio::spawn(async move {
            if let Err(e) = Self::cancel_project_siblings(db, project_id, accepted_id).await {
                tracing::warn!(
                    request_id = %accepted_id,
                    %project_id,
                    error = %e,
                    "sibling request cleanup failed"
                );
            }
        });

        Ok(())
    }

    // ------------------------------------------------------------------
    // Cancel
    // ------------------------------------------------------------------

    /// Withdraw a pending request. Restricted to the original requester.
    pub async fn cancel_request(&self, request_id: Uuid, requester_id: Uuid) -> Result<()> {
        let request = {
            let db = self.db.lock().await;
            get_request(db.conn(), request_id)?
        };

        if request.requester_id != requester_id {
            return Err(EngineError::NotRequester);
        }
        if request.status != RequestStatus::Pending {
            return Err(EngineError::AlreadyProcessed(request.status));
        }

        self.finish_request(request_id, RequestStatus::Cancelled)
            .await
    }

    /// Guarded terminal transition shared by reject and cancel.
    async fn finish_request(&self, request_id: Uuid, status: RequestStatus) -> Result<()> {
        let mut db = self.db.lock().await;
        let updated = db.transaction(|tx| {
            requests::update_status_if_pending(tx, request_id, status, Some(Utc::now()))
                .map_err(EngineError::from)
        })?;

        if !updated {
            // Someone else got there first; report the state they left.
            let request = get_request(db.conn(), request_id)?;
            return Err(EngineError::AlreadyProcessed(request.status));
        }
        drop(db);

        tracing::info!(%request_id, status = %status, "request closed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // List
    // ------------------------------------------------------------------

    /// List a party's requests (all statuses), newest first.
    pub async fn list_requests(
        &self,
        party_id: Uuid,
        direction: RequestDirection,
    ) -> Result<Vec<PartnershipRequest>> {
        let db = self.db.lock().await;
        Ok(requests::list_for_party(db.conn(), party_id, direction)?)
    }

    // ------------------------------------------------------------------
    // Unpair
    // ------------------------------------------------------------------

    /// Dissolve a student partnership.
    ///
    /// Both parties are reset to unpaired in one transaction. Afterwards,
    /// approved applications still referencing the ended partnership are
    /// cleared in bounded batches; that cleanup is best-effort and never
    /// fails the unpair itself.
    pub async fn unpair_students(&self, a: Uuid, b: Uuid) -> Result<()> {
        if a == b {
            return Err(EngineError::SelfPartnership);
        }

        {
            let mut db = self.db.lock().await;
            db.transaction(|tx| {
                let student_a = get_student(tx, a)?;
                let student_b = get_student(tx, b)?;
                if student_a.partner_id != Some(b) || student_b.partner_id != Some(a) {
                    return Err(EngineError::NotPaired(a, b));
                }

                students::set_partnership(tx, a, None)?;
                students::set_partnership(tx, b, None)?;
                Ok::<_, EngineError>(())
            })?;
        }

        tracing::info!(party_a = %a, party_b = %b, "students unpaired");

        if let Err(e) = Self::clear_partner_applications(self.db.clone(), a, b).await {
            tracing::warn!(
                party_a = %a,
                party_b = %b,
                error = %e,
                "application cleanup failed after unpair"
            );
        }
        Ok(())
    }

    /// Dissolve a co-supervision by project.
    ///
    /// Delegates to the capacity coordinator's idempotent detach, so calling
    /// it on a project without a co-supervisor is a no-op. Also used by
    /// project-completion cleanup.
    pub async fn unpair_project(&self, project_id: Uuid) -> Result<()> {
        {
            let mut db = self.db.lock().await;
            db.transaction(|tx| capacity::detach(tx, project_id))?;
        }
        tracing::info!(%project_id, "project co-supervision dissolved");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Post-commit cleanup
    // ------------------------------------------------------------------

    /// Cancel every other pending request touching either party.
    ///
    /// Each cancellation is a guarded update, so re-running after a partial
    /// failure (or concurrently with a duplicate task) is harmless.
    async fn cancel_party_siblings(
        db: Arc<Mutex<Database>>,
        a: Uuid,
        b: Uuid,
        accepted_id: Uuid,
    ) -> Result<()> {
        let mut db = db.lock().await;
        let cancelled = db.transaction(|tx| {
            let mut count = 0usize;
            for party in [a, b] {
                for sibling in requests::find_pending_for_party(tx, party, RequestDirection::All)?
                {
                    if sibling.id == accepted_id {
                        continue;
                    }
                    if requests::update_status_if_pending(
                        tx,
                        sibling.id,
                        RequestStatus::Cancelled,
                        Some(Utc::now()),
                    )? {
                        count += 1;
                    }
                }
            }
            Ok::<_, EngineError>(count)
        })?;

        if cancelled > 0 {
            tracing::info!(cancelled, party_a = %a, party_b = %b, "cancelled sibling requests");
        }
        Ok(())
    }

    /// Cancel every other pending request for the same project.
    async fn cancel_project_siblings(
        db: Arc<Mutex<Database>>,
        project_id: Uuid,
        accepted_id: Uuid,
    ) -> Result<()> {
        let mut db = db.lock().await;
        let cancelled = db.transaction(|tx| {
            let mut count = 0usize;
            for sibling in requests::find_pending_for_project(tx, project_id)? {
                if sibling.id == accepted_id {
                    continue;
                }
                if requests::update_status_if_pending(
                    tx,
                    sibling.id,
                    RequestStatus::Cancelled,
                    Some(Utc::now()),
                )? {
                    count += 1;
                }
            }
            Ok::<_, EngineError>(count)
        })?;

        if cancelled > 0 {
            tracing::info!(cancelled, %project_id, "cancelled sibling requests");
        }
        Ok(())
    }

    /// Clear partner references on both parties' approved applications, in
    /// chunks no larger than the store's batch-write cap.
    async fn clear_partner_applications(db: Arc<Mutex<Database>>, a: Uuid, b: Uuid) -> Result<()> {
        loop {
            let mut db = db.lock().await;
            let updated = db.transaction(|tx| {
                let mut n = applications::clear_partner_batch(tx, a, b, BATCH_WRITE_LIMIT)?;
                n += applications::clear_partner_batch(tx, b, a, BATCH_WRITE_LIMIT)?;
                Ok::<_, EngineError>(n)
            })?;
            drop(db);

            if updated == 0 {
                return Ok(());
            }
            tracing::debug!(updated, "cleared partner flag on applications");
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Student-create preconditions, run once on a snapshot and once inside the
/// transaction against freshly-read rows.
fn validate_student_create(conn: &Connection, requester_id: Uuid, target_id: Uuid) -> Result<()> {
    let requester = get_student(conn, requester_id)?;
    let target = get_student(conn, target_id)?;
    ensure_unpaired(&requester)?;
    ensure_unpaired(&target)?;
    ensure_no_pending_between(conn, requester_id, target_id, None)
}

/// Supervisor-create preconditions.
fn validate_supervisor_create(
    conn: &Connection,
    requester_id: Uuid,
    target_id: Uuid,
    project_id: Uuid,
) -> Result<()> {
    get_supervisor(conn, requester_id)?;
    let target = get_supervisor(conn, target_id)?;
    ensure_available(&target)?;
    if !target.has_spare_capacity() {
        return Err(EngineError::CapacityExhausted(target_id));
    }

    let project = get_project(conn, project_id)?;
    if project.supervisor_id != requester_id {
        return Err(EngineError::NotProjectOwner);
    }
    if project.co_supervisor_id.is_some() {
        return Err(EngineError::CoSupervisorTaken(project_id));
    }

    ensure_no_pending_between(conn, requester_id, target_id, Some(project_id))
}

/// Claim a pending request for a terminal transition inside a transaction.
///
/// Losing the claim means another responder already processed the request.
fn claim_pending(tx: &Transaction<'_>, request_id: Uuid, status: RequestStatus) -> Result<()> {
    if !requests::update_status_if_pending(tx, request_id, status, Some(Utc::now()))? {
        let current = get_request(tx, request_id)?;
        return Err(EngineError::AlreadyProcessed(current.status));
    }
    Ok(())
}

fn ensure_unpaired(student: &Student) -> Result<()> {
    if student.partner_id.is_some() {
        return Err(EngineError::AlreadyPaired(student.id));
    }
    Ok(())
}

fn ensure_available(supervisor: &Supervisor) -> Result<()> {
    if !supervisor.is_active || !supervisor.is_approved {
        return Err(EngineError::SupervisorUnavailable(supervisor.id));
    }
    Ok(())
}

fn ensure_no_pending_between(
    conn: &Connection,
    requester_id: Uuid,
    target_id: Uuid,
    project_id: Option<Uuid>,
) -> Result<()> {
    if let Some(existing) = requests::find_pending_between(conn, requester_id, target_id, project_id)?
    {
        return Err(if existing.requester_id == requester_id {
            EngineError::AlreadyRequested
        } else {
            EngineError::AlreadyRequestedBy
        });
    }
    Ok(())
}

fn get_student(conn: &Connection, id: Uuid) -> Result<Student> {
    students::get(conn, id).map_err(|e| match e {
        StoreError::NotFound => EngineError::StudentNotFound(id),
        other => EngineError::from(other),
    })
}

fn get_supervisor(conn: &Connection, id: Uuid) -> Result<Supervisor> {
    supervisors::get(conn, id).map_err(|e| match e {
        StoreError::NotFound => EngineError::SupervisorNotFound(id),
        other => EngineError::from(other),
    })
}

fn get_project(conn: &Connection, id: Uuid) -> Result<Project> {
    projects::get(conn, id).map_err(|e| match e {
        StoreError::NotFound => EngineError::ProjectNotFound(id),
        other => EngineError::from(other),
    })
}

fn get_request(conn: &Connection, id: Uuid) -> Result<PartnershipRequest> {
    requests::get(conn, id).map_err(|e| match e {
        StoreError::NotFound => EngineError::RequestNotFound(id),
        other => EngineError::from(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_shared::{ApplicationStatus, PartnershipStatus};
    use tandem_store::Application;

    async fn engine() -> PartnershipEngine {
        PartnershipEngine::new(Database::open_in_memory().unwrap())
    }

    async fn seed_student(engine: &PartnershipEngine, name: &str) -> Uuid {
        let student = Student::new(name);
        let db = engine.db.lock().await;
        students::insert(db.conn(), &student).unwrap();
        student.id
    }

    async fn seed_supervisor(engine: &PartnershipEngine, name: &str, max: u32, used: u32) -> Uuid {
        let mut supervisor = Supervisor::new(name, max);
        supervisor.current_capacity = used;
        let db = engine.db.lock().await;
        supervisors::insert(db.conn(), &supervisor).unwrap();
        supervisor.id
    }

    async fn seed_project(engine: &PartnershipEngine, supervisor_id: Uuid) -> Uuid {
        let project = Project::new("Capstone", supervisor_id);
        let db = engine.db.lock().await;
        projects::insert(db.conn(), &project).unwrap();
        project.id
    }

    async fn load_student(engine: &PartnershipEngine, id: Uuid) -> Student {
        let db = engine.db.lock().await;
        students::get(db.conn(), id).unwrap()
    }

    async fn load_request(engine: &PartnershipEngine, id: Uuid) -> PartnershipRequest {
        let db = engine.db.lock().await;
        requests::get(db.conn(), id).unwrap()
    }

    // -- creation --------------------------------------------------------

    #[tokio::test]
    async fn self_partnership_is_rejected_before_storage() {
        let engine = engine().await;
        let id = Uuid::new_v4();
        let result = engine.create_request(id, id, None).await;
        assert!(matches!(result, Err(EngineError::SelfPartnership)));
    }

    #[tokio::test]
    async fn missing_party_is_not_found() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let result = engine.create_request(x, Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(EngineError::StudentNotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_request_is_direction_aware() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;

        engine.create_request(x, y, None).await.unwrap();

        // Same direction: "you already requested".
        let again = engine.create_request(x, y, None).await;
        assert!(matches!(again, Err(EngineError::AlreadyRequested)));

        // Reverse direction: the second caller must be pointed at their inbox.
        let reverse = engine.create_request(y, x, None).await;
        assert!(matches!(reverse, Err(EngineError::AlreadyRequestedBy)));
    }

    #[tokio::test]
    async fn paired_party_cannot_send_or_receive() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;
        let z = seed_student(&engine, "Z").await;

        let r = engine.create_request(x, y, None).await.unwrap();
        engine
            .respond_to_request(r, y, RequestAction::Accept)
            .await
            .unwrap();

        assert!(matches!(
            engine.create_request(x, z, None).await,
            Err(EngineError::AlreadyPaired(id)) if id == x
        ));
        assert!(matches!(
            engine.create_request(z, y, None).await,
            Err(EngineError::AlreadyPaired(id)) if id == y
        ));
    }

    // -- scenario A: happy path student pairing --------------------------

    #[tokio::test]
    async fn student_accept_pairs_both_sides() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;

        let r = engine.create_request(x, y, None).await.unwrap();
        assert_eq!(load_request(&engine, r).await.status, RequestStatus::Pending);
        // Creation never mutates pairing state.
        assert_eq!(
            load_student(&engine, x).await.partnership_status,
            PartnershipStatus::None
        );

        engine
            .respond_to_request(r, y, RequestAction::Accept)
            .await
            .unwrap();

        let sx = load_student(&engine, x).await;
        let sy = load_student(&engine, y).await;
        assert_eq!(sx.partner_id, Some(y));
        assert_eq!(sy.partner_id, Some(x));
        assert_eq!(sx.partnership_status, PartnershipStatus::Paired);
        assert_eq!(sy.partnership_status, PartnershipStatus::Paired);

        let accepted = load_request(&engine, r).await;
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert!(accepted.responded_at.is_some());
    }

    // -- scenario D: sibling cleanup -------------------------------------

    #[tokio::test]
    async fn accept_cancels_sibling_requests() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;
        let z = seed_student(&engine, "Z").await;

        let r1 = engine.create_request(x, y, None).await.unwrap();
        let r2 = engine.create_request(x, z, None).await.unwrap();
        let r3 = engine.create_request(z, y, None).await.unwrap();

        engine
            .respond_to_request(r1, y, RequestAction::Accept)
            .await
            .unwrap();

        // The spawned cleanup races the test; running it directly is
        // idempotent (guarded updates), so the assertion is deterministic.
        PartnershipEngine::cancel_party_siblings(engine.db.clone(), x, y, r1)
            .await
            .unwrap();

        assert_eq!(load_request(&engine, r2).await.status, RequestStatus::Cancelled);
        assert_eq!(load_request(&engine, r3).await.status, RequestStatus::Cancelled);
        // Z was only a bystander: still unpaired.
        assert_eq!(
            load_student(&engine, z).await.partnership_status,
            PartnershipStatus::None
        );
    }

    // -- idempotence ------------------------------------------------------

    #[tokio::test]
    async fn responding_twice_conflicts_once() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;

        let r = engine.create_request(x, y, None).await.unwrap();
        engine
            .respond_to_request(r, y, RequestAction::Accept)
            .await
            .unwrap();

        let second = engine.respond_to_request(r, y, RequestAction::Accept).await;
        assert!(matches!(
            second,
            Err(EngineError::AlreadyProcessed(RequestStatus::Accepted))
        ));
    }

    #[tokio::test]
    async fn reject_leaves_parties_untouched() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;

        let r = engine.create_request(x, y, None).await.unwrap();
        engine
            .respond_to_request(r, y, RequestAction::Reject)
            .await
            .unwrap();

        assert_eq!(load_request(&engine, r).await.status, RequestStatus::Rejected);
        assert_eq!(load_student(&engine, x).await.partner_id, None);
        assert_eq!(load_student(&engine, y).await.partner_id, None);
    }

    #[tokio::test]
    async fn only_target_may_respond() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;

        let r = engine.create_request(x, y, None).await.unwrap();

        // Not even the requester may respond to their own request.
        let result = engine.respond_to_request(r, x, RequestAction::Accept).await;
        assert!(matches!(result, Err(EngineError::NotRequestTarget)));
    }

    #[tokio::test]
    async fn only_requester_may_cancel() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;

        let r = engine.create_request(x, y, None).await.unwrap();

        let result = engine.cancel_request(r, y).await;
        assert!(matches!(result, Err(EngineError::NotRequester)));

        engine.cancel_request(r, x).await.unwrap();
        assert_eq!(load_request(&engine, r).await.status, RequestStatus::Cancelled);

        // Cancelling again is an "already processed" conflict.
        let again = engine.cancel_request(r, x).await;
        assert!(matches!(
            again,
            Err(EngineError::AlreadyProcessed(RequestStatus::Cancelled))
        ));
    }

    // -- scenario B + supervisor flow -------------------------------------

    #[tokio::test]
    async fn create_fails_when_target_capacity_exhausted() {
        let engine = engine().await;
        let a = seed_supervisor(&engine, "A", 5, 2).await;
        let b = seed_supervisor(&engine, "B", 5, 5).await;
        let p = seed_project(&engine, a).await;

        let result = engine.create_request(a, b, Some(p)).await;
        assert!(matches!(
            result,
            Err(EngineError::CapacityExhausted(id)) if id == b
        ));
    }

    #[tokio::test]
    async fn only_project_owner_may_offer_co_supervision() {
        let engine = engine().await;
        let a = seed_supervisor(&engine, "A", 5, 0).await;
        let b = seed_supervisor(&engine, "B", 5, 0).await;
        let c = seed_supervisor(&engine, "C", 5, 0).await;
        let p = seed_project(&engine, a).await;

        let result = engine.create_request(b, c, Some(p)).await;
        assert!(matches!(result, Err(EngineError::NotProjectOwner)));
    }

    #[tokio::test]
    async fn supervisor_accept_attaches_and_consumes_capacity() {
        let engine = engine().await;
        let a = seed_supervisor(&engine, "A", 5, 0).await;
        let b = seed_supervisor(&engine, "B", 3, 1).await;
        let p = seed_project(&engine, a).await;

        let r = engine.create_request(a, b, Some(p)).await.unwrap();
        engine
            .respond_to_request(r, b, RequestAction::Accept)
            .await
            .unwrap();

        let db = engine.db.lock().await;
        let project = projects::get(db.conn(), p).unwrap();
        assert_eq!(project.co_supervisor_id, Some(b));
        let co = supervisors::get(db.conn(), b).unwrap();
        assert_eq!(co.current_capacity, 2);
    }

    #[tokio::test]
    async fn accept_fails_when_slot_was_taken_meanwhile() {
        let engine = engine().await;
        let a = seed_supervisor(&engine, "A", 5, 0).await;
        let b = seed_supervisor(&engine, "B", 5, 0).await;
        let c = seed_supervisor(&engine, "C", 5, 0).await;
        let p = seed_project(&engine, a).await;

        let rb = engine.create_request(a, b, Some(p)).await.unwrap();
        let rc = engine.create_request(a, c, Some(p)).await.unwrap();

        engine
            .respond_to_request(rb, b, RequestAction::Accept)
            .await
            .unwrap();

        // The second accept must re-observe the slot and fail cleanly, even
        // if the sibling cleanup has not reached rc yet.
        let result = engine.respond_to_request(rc, c, RequestAction::Accept).await;
        assert!(match result {
            Err(EngineError::CoSupervisorTaken(_)) => true,
            Err(EngineError::AlreadyProcessed(RequestStatus::Cancelled)) => true,
            _ => false,
        });

        let db = engine.db.lock().await;
        assert_eq!(projects::get(db.conn(), p).unwrap().co_supervisor_id, Some(b));
        // C's capacity untouched by the failed accept.
        assert_eq!(supervisors::get(db.conn(), c).unwrap().current_capacity, 0);
    }

    #[tokio::test]
    async fn supervisor_accept_cancels_project_siblings() {
        let engine = engine().await;
        let a = seed_supervisor(&engine, "A", 5, 0).await;
        let b = seed_supervisor(&engine, "B", 5, 0).await;
        let c = seed_supervisor(&engine, "C", 5, 0).await;
        let p = seed_project(&engine, a).await;

        let rb = engine.create_request(a, b, Some(p)).await.unwrap();
        let rc = engine.create_request(a, c, Some(p)).await.unwrap();

        engine
            .respond_to_request(rb, b, RequestAction::Accept)
            .await
            .unwrap();
        PartnershipEngine::cancel_project_siblings(engine.db.clone(), p, rb)
            .await
            .unwrap();

        assert_eq!(load_request(&engine, rc).await.status, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn inactive_supervisor_is_unavailable() {
        let engine = engine().await;
        let a = seed_supervisor(&engine, "A", 5, 0).await;
        let p = seed_project(&engine, a).await;

        let mut target = Supervisor::new("B", 5);
        target.is_active = false;
        {
            let db = engine.db.lock().await;
            supervisors::insert(db.conn(), &target).unwrap();
        }

        let result = engine.create_request(a, target.id, Some(p)).await;
        assert!(matches!(result, Err(EngineError::SupervisorUnavailable(_))));
    }

    // -- scenario E: unpair ------------------------------------------------

    #[tokio::test]
    async fn unpair_resets_both_students_and_clears_applications() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;
        let supervisor = seed_supervisor(&engine, "S", 5, 0).await;
        let p = seed_project(&engine, supervisor).await;

        let r = engine.create_request(x, y, None).await.unwrap();
        engine
            .respond_to_request(r, y, RequestAction::Accept)
            .await
            .unwrap();

        let app = Application::new(x, p, Some(y));
        {
            let db = engine.db.lock().await;
            applications::insert(db.conn(), &app).unwrap();
            applications::approve(db.conn(), app.id).unwrap();
        }

        engine.unpair_students(x, y).await.unwrap();

        let sx = load_student(&engine, x).await;
        let sy = load_student(&engine, y).await;
        assert_eq!(sx.partner_id, None);
        assert_eq!(sx.partnership_status, PartnershipStatus::None);
        assert_eq!(sy.partner_id, None);
        assert_eq!(sy.partnership_status, PartnershipStatus::None);

        let db = engine.db.lock().await;
        let cleared = applications::get(db.conn(), app.id).unwrap();
        assert!(!cleared.has_partner);
        assert_eq!(cleared.partner_id, None);
        assert_eq!(cleared.status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn unpair_requires_mutual_pairing() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;

        let result = engine.unpair_students(x, y).await;
        assert!(matches!(result, Err(EngineError::NotPaired(..))));
    }

    #[tokio::test]
    async fn unpair_project_is_idempotent() {
        let engine = engine().await;
        let a = seed_supervisor(&engine, "A", 5, 0).await;
        let b = seed_supervisor(&engine, "B", 5, 0).await;
        let p = seed_project(&engine, a).await;

        let r = engine.create_request(a, b, Some(p)).await.unwrap();
        engine
            .respond_to_request(r, b, RequestAction::Accept)
            .await
            .unwrap();

        engine.unpair_project(p).await.unwrap();
        engine.unpair_project(p).await.unwrap();

        let db = engine.db.lock().await;
        assert_eq!(projects::get(db.conn(), p).unwrap().co_supervisor_id, None);
        assert_eq!(supervisors::get(db.conn(), b).unwrap().current_capacity, 0);
    }

    // -- listing -----------------------------------------------------------

    #[tokio::test]
    async fn list_requests_filters_by_direction() {
        let engine = engine().await;
        let x = seed_student(&engine, "X").await;
        let y = seed_student(&engine, "Y").await;
        let z = seed_student(&engine, "Z").await;

        let out = engine.create_request(x, y, None).await.unwrap();
        let inc = engine.create_request(z, x, None).await.unwrap();

        let outgoing = engine
            .list_requests(x, RequestDirection::Outgoing)
            .await
            .unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].id, out);

        let incoming = engine
            .list_requests(x, RequestDirection::Incoming)
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, inc);

        let all = engine.list_requests(x, RequestDirection::All).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
