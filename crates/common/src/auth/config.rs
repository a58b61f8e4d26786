/// Configuration for bearer token issuance and verification.
///
/// Process-wide and immutable; handed to the token provider at construction.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_secs: u64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn new(secret: String, expiration_secs: u64, issuer: String) -> Self {
        Self {
            secret,
            expiration_secs,
            issuer,
        }
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expiration_secs", &self.expiration_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}
