use axum::routing::{delete, get, post};
use axum::Router;

use crate::http::{
    assign_device, authenticate_device, get_device, health, list_owned_devices, unassign_device,
    AppState, HttpLoggingConfig, HttpLoggingLayer,
};

/// Build the application router with request logging
pub fn build_router(state: AppState, logging_config: HttpLoggingConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/devices/authenticate", post(authenticate_device))
        .route("/api/v1/devices/:device_id", get(get_device))
        .route("/api/v1/devices/:device_id/assign", post(assign_device))
        .route("/api/v1/devices/:device_id/unassign", delete(unassign_device))
        .route("/api/v1/users/me/devices", get(list_owned_devices))
        .layer(HttpLoggingLayer::new(logging_config))
        .with_state(state)
}
