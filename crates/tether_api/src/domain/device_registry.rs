use anyhow::anyhow;
use chrono::Utc;
use common::domain::{
    CreateDeviceRepoInput, Device, DeviceIdentity, DeviceRepository, DomainError, DomainResult,
    GetDeviceBySerialRepoInput, GetDeviceRepoInput,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Lookup-or-create of device records keyed by certificate serial number.
///
/// The only writer of device rows. Registration is idempotent: the unique
/// serial number constraint in storage decides races between first-time
/// registrations, and the loser re-reads the winner's row.
pub struct DeviceRegistry {
    device_repository: Arc<dyn DeviceRepository>,
}

impl DeviceRegistry {
    pub fn new(device_repository: Arc<dyn DeviceRepository>) -> Self {
        Self { device_repository }
    }

    /// Return the device registered for this identity, creating it on first sight
    #[instrument(skip(self, identity), fields(serial_number = %identity.serial_number))]
    pub async fn register_or_get(&self, identity: DeviceIdentity) -> DomainResult<Device> {
        let lookup = GetDeviceBySerialRepoInput {
            serial_number: identity.serial_number.clone(),
        };

        if let Some(device) = self
            .device_repository
            .get_device_by_serial(lookup.clone())
            .await?
        {
            debug!(device_id = %device.id, "device already registered");
            note_issuer_change(&device, &identity);
            return Ok(device);
        }

        let repo_input = CreateDeviceRepoInput {
            id: xid::new().to_string(),
            serial_number: identity.serial_number.clone(),
            issuer_common_name: identity.issuer_common_name.clone(),
            created_at: Utc::now(),
        };

        match self.device_repository.create_device(repo_input).await {
            Ok(device) => {
                info!(device_id = %device.id, issuer = %device.issuer_common_name, "registered new device");
                Ok(device)
            }
            Err(DomainError::DuplicateSerial(_)) => {
                debug!("concurrent registration won, re-fetching device");
                let device = self
                    .device_repository
                    .get_device_by_serial(lookup)
                    .await?
                    .ok_or_else(|| {
                        DomainError::RepositoryError(anyhow!(
                            "device with serial {} missing after duplicate insert",
                            identity.serial_number
                        ))
                    })?;
                note_issuer_change(&device, &identity);
                Ok(device)
            }
            Err(e) => Err(e),
        }
    }

    /// Get a device by id
    #[instrument(skip(self))]
    pub async fn get_device(&self, device_id: &str) -> DomainResult<Device> {
        self.device_repository
            .get_device(GetDeviceRepoInput {
                device_id: device_id.to_string(),
            })
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))
    }
}

// The stored issuer is fixed at first registration and never overwritten.
fn note_issuer_change(device: &Device, identity: &DeviceIdentity) {
    if device.issuer_common_name != identity.issuer_common_name {
        warn!(
            device_id = %device.id,
            registered_issuer = %device.issuer_common_name,
            presented_issuer = %identity.issuer_common_name,
            "certificate issuer differs from registered issuer"
        );
    }
}
