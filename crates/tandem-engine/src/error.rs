use thiserror::Error;
use uuid::Uuid;

use tandem_shared::RequestStatus;
use tandem_store::{StoreError, TxError};

/// Broad class of an [`EngineError`].
///
/// Transport layers map classes to status codes; the engine itself only
/// distinguishes expected, user-facing outcomes (the first four) from
/// infrastructure failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    Infrastructure,
}

/// Errors produced by the workflow engine and capacity coordinator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("A party cannot partner with itself")]
    SelfPartnership,

    #[error("Supervisor requests must reference a project")]
    MalformedRequest,

    #[error("Student not found: {0}")]
    StudentNotFound(Uuid),

    #[error("Supervisor not found: {0}")]
    SupervisorNotFound(Uuid),

    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Request not found: {0}")]
    RequestNotFound(Uuid),

    /// A pending request from the caller to the same party already exists.
    #[error("You already have a pending request to this party")]
    AlreadyRequested,

    /// The reverse request exists; the caller should respond to it instead
    /// of creating a duplicate.
    #[error("This party already sent you a request; respond to it instead")]
    AlreadyRequestedBy,

    #[error("Party {0} is already paired")]
    AlreadyPaired(Uuid),

    #[error("Project {0} already has a co-supervisor")]
    CoSupervisorTaken(Uuid),

    #[error("Supervisor {0} has no available capacity")]
    CapacityExhausted(Uuid),

    #[error("Supervisor {0} is not accepting co-supervisions")]
    SupervisorUnavailable(Uuid),

    #[error("Request already processed (status: {0})")]
    AlreadyProcessed(RequestStatus),

    #[error("Students {0} and {1} are not paired with each other")]
    NotPaired(Uuid, Uuid),

    #[error("Only the project's own supervisor can offer it for co-supervision")]
    NotProjectOwner,

    #[error("Only the request's target may respond to it")]
    NotRequestTarget,

    #[error("Only the original requester may cancel a request")]
    NotRequester,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Classify the error for transport mapping.
    pub fn class(&self) -> ErrorClass {
        use EngineError::*;
        match self {
            SelfPartnership | MalformedRequest => ErrorClass::Validation,
            StudentNotFound(_) | SupervisorNotFound(_) | ProjectNotFound(_)
            | RequestNotFound(_) => ErrorClass::NotFound,
            AlreadyRequested | AlreadyRequestedBy | AlreadyPaired(_) | CoSupervisorTaken(_)
            | CapacityExhausted(_) | SupervisorUnavailable(_) | AlreadyProcessed(_)
            | NotPaired(..) => ErrorClass::Conflict,
            NotProjectOwner | NotRequestTarget | NotRequester => ErrorClass::Authorization,
            Store(StoreError::NotFound) => ErrorClass::NotFound,
            Store(_) => ErrorClass::Infrastructure,
        }
    }
}

impl TxError for EngineError {
    fn is_write_conflict(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_write_conflict())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_line_up_with_taxonomy() {
        assert_eq!(EngineError::SelfPartnership.class(), ErrorClass::Validation);
        assert_eq!(
            EngineError::RequestNotFound(Uuid::new_v4()).class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            EngineError::CapacityExhausted(Uuid::new_v4()).class(),
            ErrorClass::Conflict
        );
        assert_eq!(EngineError::NotRequestTarget.class(), ErrorClass::Authorization);
        assert_eq!(
            EngineError::Store(StoreError::RetriesExhausted(5)).class(),
            ErrorClass::Infrastructure
        );
        // A missing record surfaced by the store is a user-facing not-found.
        assert_eq!(
            EngineError::Store(StoreError::NotFound).class(),
            ErrorClass::NotFound
        );
    }
}
