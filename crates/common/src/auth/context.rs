use http::header::AUTHORIZATION;
use http::HeaderMap;

use super::traits::AuthTokenProvider;
use crate::domain::{DomainError, DomainResult};

/// User identity established from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
}

/// Extract user context from a request's authorization header
///
/// Expects a Bearer token in the Authorization header and validates it
/// using the provided AuthTokenProvider.
///
/// # Returns
/// * `Ok(UserContext)` - Verified user identity
/// * `Err(DomainError::InvalidToken)` - Missing header, invalid format, or rejected token
pub fn extract_user_context(
    headers: &HeaderMap,
    auth_token_provider: &dyn AuthTokenProvider,
) -> DomainResult<UserContext> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| DomainError::InvalidToken("missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| DomainError::InvalidToken("invalid authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            DomainError::InvalidToken(
                "invalid authorization format, expected 'Bearer <token>'".to_string(),
            )
        })?;

    let claims = auth_token_provider.validate_token(token)?;

    Ok(UserContext {
        user_id: claims.user_id,
    })
}
