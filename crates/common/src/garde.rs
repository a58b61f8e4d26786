//! Service request validation on top of garde.

use crate::domain::DomainError;
use garde::Validate;

/// Run a request's garde rules, reporting every failing field as
/// `field: message` in one `ValidationError`
pub fn validate_request<T>(request: &T) -> Result<(), DomainError>
where
    T: Validate<Context = ()>,
{
    request.validate().map_err(|report| {
        let fields: Vec<String> = report
            .iter()
            .map(|(path, error)| format!("{}: {}", path, error.message()))
            .collect();
        DomainError::ValidationError(fields.join("; "))
    })
}
