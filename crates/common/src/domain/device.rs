use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable external key of a device, derived from its client certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// Uppercase hexadecimal rendering of the certificate serial number
    pub serial_number: String,
    pub issuer_common_name: String,
}

/// Device domain entity
///
/// Created once per distinct serial number on first successful
/// authentication. The issuer is fixed at that point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub serial_number: String,
    pub issuer_common_name: String,
    pub created_at: DateTime<Utc>,
}

/// Repository input for creating a device (id and timestamp generated by the registry)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeviceRepoInput {
    pub id: String,
    pub serial_number: String,
    pub issuer_common_name: String,
    pub created_at: DateTime<Utc>,
}

/// Repository input for fetching a device by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceRepoInput {
    pub device_id: String,
}

/// Repository input for fetching a device by certificate serial number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceBySerialRepoInput {
    pub serial_number: String,
}

/// Repository trait for device storage operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert a new device. Fails with `DuplicateSerial` if the serial number is taken.
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device>;

    /// Get a device by id
    async fn get_device(&self, input: GetDeviceRepoInput) -> DomainResult<Option<Device>>;

    /// Get a device by certificate serial number
    async fn get_device_by_serial(
        &self,
        input: GetDeviceBySerialRepoInput,
    ) -> DomainResult<Option<Device>>;

    /// Check whether a device with this serial number is registered
    async fn device_exists_by_serial(&self, input: GetDeviceBySerialRepoInput)
        -> DomainResult<bool>;
}
