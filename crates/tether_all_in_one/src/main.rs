use common::auth::{JwtAuthTokenProvider, JwtConfig};
use common::postgres::{
    PostgresAssignmentRepository, PostgresClient, PostgresConfig, PostgresDeviceRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use std::sync::Arc;
use tether_all_in_one::config::ServiceConfig;
use tether_api::domain::DeviceService;
use tether_api::http::{AppState, HttpLoggingConfig, HttpServerConfig};
use tether_api::TetherApi;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Initialize configuration and tracing
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        http_port = config.http_port,
        "Starting tether-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let postgres_client = match initialize_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    // Initialize domain services
    let device_service = Arc::new(DeviceService::new(
        Arc::new(PostgresDeviceRepository::new(postgres_client.clone())),
        Arc::new(PostgresAssignmentRepository::new(postgres_client)),
    ));
    let auth_token_provider = Arc::new(JwtAuthTokenProvider::new(JwtConfig::new(
        config.jwt_secret.clone(),
        config.jwt_expiration_secs,
        config.jwt_issuer.clone(),
    )));

    let tether_api = TetherApi::new(
        AppState::new(device_service, auth_token_provider),
        HttpServerConfig {
            host: config.http_host.clone(),
            port: config.http_port,
            tls_cert_file: config.tls_cert_file.clone(),
            tls_key_file: config.tls_key_file.clone(),
            tls_ca_file: config.tls_ca_file.clone(),
            require_client_cert: config.tls_require_client_cert,
        },
        HttpLoggingConfig::new(config.ignored_paths()),
    );

    let shutdown_token = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown_token.clone()));

    let process = tether_api.into_runner_process();
    let result = process(shutdown_token.clone()).await;

    info!("Running cleanup tasks...");
    shutdown_token.cancel();
    let exit_code = match result {
        Ok(()) => 0,
        Err(e) => {
            error!("Tether API exited with error: {:#}", e);
            1
        }
    };

    // Flush pending traces and logs
    shutdown_telemetry(telemetry_providers);
    std::process::exit(exit_code);
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    info!("Initializing PostgreSQL...");
    let client = PostgresClient::from_config(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
    })?;
    client.ping().await?;
    client.run_migrations().await?;
    Ok(client)
}

/// Cancel `token` on SIGINT, or SIGTERM on unix
async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Error setting up signal handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Error setting up SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received shutdown signal"),
        _ = terminate => info!("Received SIGTERM signal"),
        _ = token.cancelled() => return,
    }
    token.cancel();
}
