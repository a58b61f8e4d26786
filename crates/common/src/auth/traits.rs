use crate::auth::UserClaims;
use crate::domain::DomainResult;

/// Trait for bearer token operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthTokenProvider: Send + Sync {
    /// Issue a signed token asserting the given user identity
    fn generate_token(&self, user_id: &str) -> DomainResult<String>;

    /// Verify a token and return its claims
    fn validate_token(&self, token: &str) -> DomainResult<UserClaims>;
}
