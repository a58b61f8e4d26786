use crate::domain::{
    CreateDeviceRepoInput, Device, DeviceRepository, DomainError, DomainResult,
    GetDeviceBySerialRepoInput, GetDeviceRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use tracing::{debug, instrument};

/// Device row for PostgreSQL storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: String,
    pub serial_number: String,
    pub issuer_common_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Row> for DeviceRow {
    fn from(row: &Row) -> Self {
        DeviceRow {
            id: row.get(0),
            serial_number: row.get(1),
            issuer_common_name: row.get(2),
            created_at: row.get(3),
        }
    }
}

/// Convert database DeviceRow to domain Device
impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            serial_number: row.serial_number,
            issuer_common_name: row.issuer_common_name,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL implementation of DeviceRepository trait
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, input), fields(device_id = %input.id, serial_number = %input.serial_number))]
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let result = conn
            .execute(
                "INSERT INTO devices (id, serial_number, issuer_common_name, created_at)
                 VALUES ($1, $2, $3, $4)",
                &[
                    &input.id,
                    &input.serial_number,
                    &input.issuer_common_name,
                    &input.created_at,
                ],
            )
            .await;

        if let Err(e) = result {
            if let Some(db_err) = e.as_db_error() {
                // PostgreSQL error code 23505 is unique_violation
                if db_err.code().code() == "23505" {
                    return Err(DomainError::DuplicateSerial(input.serial_number));
                }
            }
            return Err(DomainError::RepositoryError(e.into()));
        }

        debug!("registered device: {}", input.id);

        Ok(Device {
            id: input.id,
            serial_number: input.serial_number,
            issuer_common_name: input.issuer_common_name,
            created_at: input.created_at,
        })
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id))]
    async fn get_device(&self, input: GetDeviceRepoInput) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, serial_number, issuer_common_name, created_at
                 FROM devices
                 WHERE id = $1",
                &[&input.device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| DeviceRow::from(&row).into()))
    }

    #[instrument(skip(self, input), fields(serial_number = %input.serial_number))]
    async fn get_device_by_serial(
        &self,
        input: GetDeviceBySerialRepoInput,
    ) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, serial_number, issuer_common_name, created_at
                 FROM devices
                 WHERE serial_number = $1",
                &[&input.serial_number],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let device_row = DeviceRow::from(&row);
                debug!("found device by serial: {}", device_row.id);
                Ok(Some(device_row.into()))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, input), fields(serial_number = %input.serial_number))]
    async fn device_exists_by_serial(
        &self,
        input: GetDeviceBySerialRepoInput,
    ) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM devices WHERE serial_number = $1)",
                &[&input.serial_number],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }
}
