//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so records can be
//! returned directly inside JSON response envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tandem_shared::{
    ApplicationStatus, PartnershipStatus, ProjectStatus, RequestKind, RequestStatus,
};

// ---------------------------------------------------------------------------
// Student
// ---------------------------------------------------------------------------

/// A student party.
///
/// Invariant: `partner_id` is set exactly when `partnership_status` is
/// `paired`, and the referenced student's `partner_id` points back. Both
/// fields are always written together (see [`crate::students::set_partnership`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Student {
    pub id: Uuid,
    pub display_name: String,
    /// Current partner, if paired.
    pub partner_id: Option<Uuid>,
    pub partnership_status: PartnershipStatus,
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Fresh unpaired student.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            partner_id: None,
            partnership_status: PartnershipStatus::None,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// A supervisor party.
///
/// Supervisors pair per-project through a project's co-supervisor slot
/// rather than through a global partner field. Invariant:
/// `0 <= current_capacity <= max_capacity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Supervisor {
    pub id: Uuid,
    pub display_name: String,
    /// Maximum number of concurrent projects this supervisor may carry.
    pub max_capacity: u32,
    /// Units of capacity currently consumed.
    pub current_capacity: u32,
    pub is_active: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Supervisor {
    pub fn new(display_name: impl Into<String>, max_capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            max_capacity,
            current_capacity: 0,
            is_active: true,
            is_approved: true,
            created_at: Utc::now(),
        }
    }

    /// Whether one more project fits.
    pub fn has_spare_capacity(&self) -> bool {
        self.current_capacity < self.max_capacity
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A capstone project.
///
/// At most one co-supervisor; a set `co_supervisor_id` implies that
/// supervisor's `current_capacity` counts this project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub supervisor_id: Uuid,
    pub co_supervisor_id: Option<Uuid>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(title: impl Into<String>, supervisor_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            supervisor_id,
            co_supervisor_id: None,
            status: ProjectStatus::Active,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Partnership request
// ---------------------------------------------------------------------------

/// A proposal from one party to another to pair.
///
/// Requests are append-only: they are created `pending` and mutated exactly
/// once into a terminal status, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartnershipRequest {
    pub id: Uuid,
    pub kind: RequestKind,
    pub requester_id: Uuid,
    pub target_id: Uuid,
    /// Set for supervisor requests; supervisors negotiate per-project.
    pub project_id: Option<Uuid>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl PartnershipRequest {
    /// New pending student-to-student request.
    pub fn new_student(requester_id: Uuid, target_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: RequestKind::Student,
            requester_id,
            target_id,
            project_id: None,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        }
    }

    /// New pending supervisor-to-supervisor request scoped to a project.
    pub fn new_supervisor(requester_id: Uuid, target_id: Uuid, project_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: RequestKind::Supervisor,
            requester_id,
            target_id,
            project_id: Some(project_id),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// A student's application to a project.
///
/// Carries a snapshot of the student's partner at application time; when a
/// partnership ends, approved applications referencing the prior partner are
/// cleared in bounded batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Application {
    pub id: Uuid,
    pub student_id: Uuid,
    pub project_id: Uuid,
    pub partner_id: Option<Uuid>,
    pub has_partner: bool,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn new(student_id: Uuid, project_id: Uuid, partner_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            project_id,
            partner_id,
            has_partner: partner_id.is_some(),
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
