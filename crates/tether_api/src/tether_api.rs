use crate::http::{build_router, run_http_server, AppState, HttpLoggingConfig, HttpServerConfig};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct TetherApi {
    router: Router,
    config: HttpServerConfig,
}

impl TetherApi {
    pub fn new(state: AppState, config: HttpServerConfig, logging_config: HttpLoggingConfig) -> Self {
        debug!("Initializing Tether API module");
        Self {
            router: build_router(state, logging_config),
            config,
        }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| Box::pin(async move { run_http_server(self.config, self.router, ctx).await })
    }
}
