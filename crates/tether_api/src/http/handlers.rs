use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use common::auth::{extract_user_context, AuthTokenProvider, PeerCertificate};
use common::domain::{Device, OwnedDevice};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::domain::{
    AssignDeviceRequest, DeviceService, DeviceView, GetDeviceRequest, ListOwnedDevicesRequest,
    UnassignDeviceRequest,
};
use crate::http::ApiError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub device_service: Arc<DeviceService>,
    pub auth_token_provider: Arc<dyn AuthTokenProvider>,
}

impl AppState {
    pub fn new(
        device_service: Arc<DeviceService>,
        auth_token_provider: Arc<dyn AuthTokenProvider>,
    ) -> Self {
        Self {
            device_service,
            auth_token_provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub id: String,
    pub serial_number: String,
    pub issuer_common_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            serial_number: device.serial_number,
            issuer_common_name: device.issuer_common_name,
            created_at: device.created_at,
        }
    }
}

/// Device with its current assignment flattened in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceViewResponse {
    #[serde(flatten)]
    pub device: DeviceResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    pub is_assigned: bool,
}

impl From<DeviceView> for DeviceViewResponse {
    fn from(view: DeviceView) -> Self {
        let is_assigned = view.assignment.is_some();
        let (assignment_id, user_id, assigned_at) = match view.assignment {
            Some(a) => (Some(a.id), Some(a.user_id), Some(a.assigned_at)),
            None => (None, None, None),
        };
        Self {
            device: view.device.into(),
            assignment_id,
            user_id,
            assigned_at,
            is_assigned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedDeviceResponse {
    #[serde(flatten)]
    pub device: DeviceResponse,
    pub assignment_id: String,
    pub assigned_at: DateTime<Utc>,
}

impl From<OwnedDevice> for OwnedDeviceResponse {
    fn from(owned: OwnedDevice) -> Self {
        Self {
            device: owned.device.into(),
            assignment_id: owned.assignment.id,
            assigned_at: owned.assignment.assigned_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOwnedDevicesResponse {
    pub devices: Vec<OwnedDeviceResponse>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// POST /api/v1/devices/authenticate
#[instrument(name = "AuthenticateDevice", skip(state, peer_certificate))]
pub async fn authenticate_device(
    State(state): State<AppState>,
    peer_certificate: Option<Extension<PeerCertificate>>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let certificate = peer_certificate
        .as_ref()
        .map(|Extension(certificate)| certificate.as_der());

    let device = state.device_service.authenticate_device(certificate).await?;

    info!(device_id = %device.id, "device authenticated");

    Ok(Json(device.into()))
}

/// GET /api/v1/devices/{device_id}
#[instrument(name = "GetDevice", skip(state, headers))]
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeviceViewResponse>, ApiError> {
    let user_context = extract_user_context(&headers, state.auth_token_provider.as_ref())?;

    let view = state
        .device_service
        .get_device(GetDeviceRequest {
            user_id: user_context.user_id,
            device_id,
        })
        .await?;

    Ok(Json(view.into()))
}

/// POST /api/v1/devices/{device_id}/assign
#[instrument(name = "AssignDevice", skip(state, headers))]
pub async fn assign_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_context = extract_user_context(&headers, state.auth_token_provider.as_ref())?;

    state
        .device_service
        .assign_device(AssignDeviceRequest {
            user_id: user_context.user_id,
            device_id,
        })
        .await?;

    Ok(Json(MessageResponse::new("Device assigned successfully")))
}

/// DELETE /api/v1/devices/{device_id}/unassign
#[instrument(name = "UnassignDevice", skip(state, headers))]
pub async fn unassign_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_context = extract_user_context(&headers, state.auth_token_provider.as_ref())?;

    state
        .device_service
        .unassign_device(UnassignDeviceRequest {
            user_id: user_context.user_id,
            device_id,
        })
        .await?;

    Ok(Json(MessageResponse::new("Device unassigned successfully")))
}

/// GET /api/v1/users/me/devices
#[instrument(name = "ListOwnedDevices", skip(state, headers))]
pub async fn list_owned_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListOwnedDevicesResponse>, ApiError> {
    let user_context = extract_user_context(&headers, state.auth_token_provider.as_ref())?;

    let owned = state
        .device_service
        .list_owned_devices(ListOwnedDevicesRequest {
            user_id: user_context.user_id,
        })
        .await?;

    debug!(count = owned.len(), "retrieved user devices");

    let devices: Vec<OwnedDeviceResponse> = owned.into_iter().map(Into::into).collect();
    Ok(Json(ListOwnedDevicesResponse {
        count: devices.len(),
        devices,
    }))
}
