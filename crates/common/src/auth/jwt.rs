use crate::auth::{AuthTokenProvider, JwtConfig};
use crate::domain::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a user bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(default)]
    pub user_id: String,
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    pub iat: i64, // issued at
    pub exp: i64, // expires at
    pub nbf: i64, // not before
}

/// HS256 implementation of AuthTokenProvider.
///
/// Verification accepts HS256 only, with zero leeway on `exp` and `nbf`.
pub struct JwtAuthTokenProvider {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthTokenProvider {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Issue a token whose validity window starts at `issued_at`
    pub fn generate_token_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> DomainResult<String> {
        if user_id.is_empty() {
            return Err(DomainError::ValidationError(
                "user_id must not be empty".to_string(),
            ));
        }

        let iat = issued_at.timestamp();
        let claims = UserClaims {
            user_id: user_id.to_string(),
            iss: self.config.issuer.clone(),
            sub: user_id.to_string(),
            iat,
            exp: iat + self.config.expiration_secs as i64,
            nbf: iat,
        };

        self.sign(&Header::new(Algorithm::HS256), &claims)
    }

    fn sign(&self, header: &Header, claims: &UserClaims) -> DomainResult<String> {
        encode(header, claims, &self.encoding_key)
            .map_err(|e| DomainError::TokenSigningError(e.to_string()))
    }
}

impl AuthTokenProvider for JwtAuthTokenProvider {
    fn generate_token(&self, user_id: &str) -> DomainResult<String> {
        self.generate_token_at(user_id, Utc::now())
    }

    fn validate_token(&self, token: &str) -> DomainResult<UserClaims> {
        let token_data = decode::<UserClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| DomainError::InvalidToken(e.to_string()))?;

        if token_data.claims.user_id.is_empty() {
            return Err(DomainError::InvalidToken(
                "user ID is missing from token".to_string(),
            ));
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const LIFETIME_SECS: u64 = 3600;

    fn test_config() -> JwtConfig {
        JwtConfig::new(
            "test-secret-key".to_string(),
            LIFETIME_SECS,
            "tether-test".to_string(),
        )
    }

    fn sign_raw(claims: &serde_json::Value, algorithm: Algorithm, secret: &str) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_and_validate_token() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let token = provider.generate_token("user-123").unwrap();

        let claims = provider.validate_token(&token).unwrap();
        assert_eq!(claims.user_id, "user-123");
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.iss, "tether-test");
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp - claims.iat, LIFETIME_SECS as i64);
    }

    #[test]
    fn test_generate_token_empty_user_id() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let result = provider.generate_token("");
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_token_valid_at_half_lifetime() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let issued_at = Utc::now() - Duration::seconds(LIFETIME_SECS as i64 / 2);
        let token = provider.generate_token_at("user-123", issued_at).unwrap();

        assert!(provider.validate_token(&token).is_ok());
    }

    #[test]
    fn test_token_rejected_one_second_after_expiry() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let issued_at = Utc::now() - Duration::seconds(LIFETIME_SECS as i64 + 1);
        let token = provider.generate_token_at("user-123", issued_at).unwrap();

        let result = provider.validate_token(&token);
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_token_rejected_before_not_before() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let issued_at = Utc::now() + Duration::seconds(120);
        let token = provider.generate_token_at("user-123", issued_at).unwrap();

        let result = provider.validate_token(&token);
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_signing_failure_maps_to_token_signing_error() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            user_id: "user-123".to_string(),
            iss: "tether-test".to_string(),
            sub: "user-123".to_string(),
            iat: now,
            exp: now + 600,
            nbf: now,
        };

        // An HMAC key cannot produce an RSA signature
        let result = provider.sign(&Header::new(Algorithm::RS256), &claims);
        assert!(matches!(result, Err(DomainError::TokenSigningError(_))));
    }

    #[test]
    fn test_validate_token_invalid() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let result = provider.validate_token("invalid-token");
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let provider1 = JwtAuthTokenProvider::new(test_config());
        let provider2 = JwtAuthTokenProvider::new(JwtConfig::new(
            "different-secret".to_string(),
            LIFETIME_SECS,
            "tether-test".to_string(),
        ));

        let token = provider1.generate_token("user-123").unwrap();
        let result = provider2.validate_token(&token);
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_validate_token_rejects_other_algorithm() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "user_id": "user-123",
            "iss": "tether-test",
            "sub": "user-123",
            "iat": now,
            "exp": now + 600,
            "nbf": now,
        });

        let token = sign_raw(&claims, Algorithm::HS512, "test-secret-key");
        let result = provider.validate_token(&token);
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_validate_token_rejects_wrong_issuer() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let other = JwtAuthTokenProvider::new(JwtConfig::new(
            "test-secret-key".to_string(),
            LIFETIME_SECS,
            "someone-else".to_string(),
        ));

        let token = other.generate_token("user-123").unwrap();
        let result = provider.validate_token(&token);
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_validate_token_missing_user_id() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": "tether-test",
            "sub": "user-123",
            "iat": now,
            "exp": now + 600,
            "nbf": now,
        });

        let token = sign_raw(&claims, Algorithm::HS256, "test-secret-key");
        let result = provider.validate_token(&token);
        match result {
            Err(DomainError::InvalidToken(msg)) => assert!(msg.contains("user ID")),
            other => panic!("expected InvalidToken, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_token_missing_not_before() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "user_id": "user-123",
            "iss": "tether-test",
            "iat": now,
            "exp": now + 600,
        });

        let token = sign_raw(&claims, Algorithm::HS256, "test-secret-key");
        assert!(provider.validate_token(&token).is_err());
    }
}
