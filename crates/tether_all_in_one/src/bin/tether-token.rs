//! Issue a bearer token for a user id using the service's JWT settings.
//!
//! Reads the same `TETHER_*` environment as the server, so tokens it prints
//! verify against a running instance sharing that environment.

use clap::Parser;
use common::auth::{AuthTokenProvider, JwtAuthTokenProvider, JwtConfig};
use tether_all_in_one::config::ServiceConfig;

#[derive(Parser, Debug)]
#[command(name = "tether-token", version, about = "Issue a tether user bearer token")]
struct Cli {
    /// User id placed in the token's claims
    user_id: String,

    /// Override TETHER_JWT_EXPIRATION_SECS for this token
    #[arg(long)]
    expiration_secs: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::from_env()?;
    config.validate()?;

    let provider = JwtAuthTokenProvider::new(JwtConfig::new(
        config.jwt_secret,
        cli.expiration_secs.unwrap_or(config.jwt_expiration_secs),
        config.jwt_issuer,
    ));
    let token = provider.generate_token(&cli.user_id)?;
    println!("{}", token);
    Ok(())
}
