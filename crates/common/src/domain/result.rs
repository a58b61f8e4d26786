use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device already assigned: {0}")]
    DeviceAlreadyAssigned(String),

    #[error("No active assignment for device: {0}")]
    NoActiveAssignment(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Device with serial number already exists: {0}")]
    DuplicateSerial(String),

    #[error("Token signing failed: {0}")]
    TokenSigningError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
