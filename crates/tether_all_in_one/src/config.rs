use anyhow::{anyhow, Result};
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP configuration
    /// HTTPS listener host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTPS listener port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request path prefixes excluded from request logging (comma-separated)
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    // TLS configuration
    /// PEM server certificate chain
    #[serde(default = "default_tls_cert_file")]
    pub tls_cert_file: String,

    /// PEM server private key
    #[serde(default = "default_tls_key_file")]
    pub tls_key_file: String,

    /// PEM CA bundle used to verify device certificates
    #[serde(default = "default_tls_ca_file")]
    pub tls_ca_file: String,

    /// Reject TLS handshakes without a client certificate
    #[serde(default)]
    pub tls_require_client_cert: bool,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum pooled PostgreSQL connections
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // JWT configuration
    /// JWT signing secret (required)
    #[serde(default)]
    pub jwt_secret: String,

    /// JWT lifetime in seconds (default: 24 hours)
    #[serde(default = "default_jwt_expiration_secs")]
    pub jwt_expiration_secs: u64,

    /// JWT issuer, set on issued tokens and required on verified ones
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    // OpenTelemetry configuration
    /// Enable OpenTelemetry export
    #[serde(default)]
    pub otel_enabled: bool,

    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Service name reported to OpenTelemetry
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8443
}

fn default_http_ignored_paths() -> String {
    "/health".to_string()
}

fn default_tls_cert_file() -> String {
    "certs/server.crt".to_string()
}

fn default_tls_key_file() -> String {
    "certs/server.key".to_string()
}

fn default_tls_ca_file() -> String {
    "certs/ca.crt".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "tether".to_string()
}

fn default_postgres_username() -> String {
    "tether".to_string()
}

fn default_postgres_password() -> String {
    "tether".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_jwt_expiration_secs() -> u64 {
    24 * 60 * 60
}

fn default_jwt_issuer() -> String {
    "tether".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "tether".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("TETHER"))
            .build()?
            .try_deserialize()
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            return Err(anyhow!("TETHER_JWT_SECRET must be set"));
        }
        if self.jwt_expiration_secs == 0 {
            return Err(anyhow!("TETHER_JWT_EXPIRATION_SECS must be positive"));
        }
        for (name, value) in [
            ("TETHER_TLS_CERT_FILE", &self.tls_cert_file),
            ("TETHER_TLS_KEY_FILE", &self.tls_key_file),
            ("TETHER_TLS_CA_FILE", &self.tls_ca_file),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{} must not be empty", name));
            }
        }
        Ok(())
    }

    /// Split the comma-separated ignored path list
    pub fn ignored_paths(&self) -> Vec<String> {
        self.http_ignored_paths
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("http_host", &self.http_host)
            .field("http_port", &self.http_port)
            .field("http_ignored_paths", &self.http_ignored_paths)
            .field("tls_cert_file", &self.tls_cert_file)
            .field("tls_key_file", &self.tls_key_file)
            .field("tls_ca_file", &self.tls_ca_file)
            .field("tls_require_client_cert", &self.tls_require_client_cert)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_username", &self.postgres_username)
            .field("postgres_password", &"<redacted>")
            .field("postgres_max_pool_size", &self.postgres_max_pool_size)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("otel_enabled", &self.otel_enabled)
            .field("otel_endpoint", &self.otel_endpoint)
            .field("otel_service_name", &self.otel_service_name)
            .finish()
    }
}
