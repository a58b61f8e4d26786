use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::domain::DomainError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// JSON error body returned by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// HTTP-facing wrapper around `DomainError`
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code and client-facing message for the wrapped error.
    ///
    /// `Forbidden` shares the not-found response so callers cannot test for
    /// devices owned by other users. Storage details are never returned.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            DomainError::InvalidCertificate(_) => (StatusCode::UNAUTHORIZED, "Invalid client certificate"),
            DomainError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            DomainError::DeviceNotFound(_) => (StatusCode::NOT_FOUND, "Device not found"),
            DomainError::Forbidden(_) => (
                StatusCode::NOT_FOUND,
                "Device not found or not assigned to you",
            ),
            DomainError::DeviceAlreadyAssigned(_) => (StatusCode::CONFLICT, "Device is already assigned"),
            DomainError::NoActiveAssignment(_) => (StatusCode::CONFLICT, "Device is not assigned"),
            DomainError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            DomainError::DuplicateSerial(_)
            | DomainError::TokenSigningError(_)
            | DomainError::RepositoryError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let message = match &self.0 {
            // Validation messages only name request fields, safe to echo
            DomainError::ValidationError(detail) => format!("{}: {}", message, detail),
            _ => message.to_string(),
        };

        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "request failed");
        } else {
            warn!(error = %self.0, status = status.as_u16(), "request rejected");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).status_and_message().0
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(DomainError::InvalidCertificate("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainError::InvalidToken("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainError::DeviceNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::DeviceAlreadyAssigned("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::ValidationError("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::RepositoryError(anyhow!("db down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(DomainError::TokenSigningError("bad key".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_forbidden_indistinguishable_from_missing_owned_device() {
        let forbidden = ApiError::from(DomainError::Forbidden("dev-1".into())).status_and_message();
        assert_eq!(forbidden.0, StatusCode::NOT_FOUND);
        assert_eq!(forbidden.1, "Device not found or not assigned to you");
    }

    #[test]
    fn test_repository_details_not_leaked() {
        let (_, message) =
            ApiError::from(DomainError::RepositoryError(anyhow!("password=secret"))).status_and_message();
        assert!(!message.contains("secret"));
    }
}
