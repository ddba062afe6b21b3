use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tandem_engine::{EngineError, ErrorClass};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Missing caller identity headers")]
    MissingIdentity,

    #[error("Invalid caller identity: {0}")]
    InvalidIdentity(String),

    #[error("Caller may only act as themselves")]
    IdentityMismatch,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::MissingIdentity | ServerError::InvalidIdentity(_) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ServerError::IdentityMismatch => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Engine(e) => match e.class() {
                ErrorClass::Validation => (StatusCode::BAD_REQUEST, e.to_string()),
                ErrorClass::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
                ErrorClass::Conflict => (StatusCode::CONFLICT, e.to_string()),
                ErrorClass::Authorization => (StatusCode::FORBIDDEN, e.to_string()),
                ErrorClass::Infrastructure => {
                    // Details go to the log, not the wire.
                    tracing::error!(error = %e, "request failed on infrastructure error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn engine_classes_map_to_statuses() {
        let cases = [
            (EngineError::SelfPartnership, StatusCode::BAD_REQUEST),
            (
                EngineError::RequestNotFound(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::CapacityExhausted(Uuid::new_v4()),
                StatusCode::CONFLICT,
            ),
            (EngineError::NotRequestTarget, StatusCode::FORBIDDEN),
        ];

        for (error, expected) in cases {
            let response = ServerError::from(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn infrastructure_errors_are_opaque_500s() {
        let error = ServerError::from(EngineError::Store(
            tandem_store::StoreError::RetriesExhausted(5),
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
