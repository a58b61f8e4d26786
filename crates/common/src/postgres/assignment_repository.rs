use crate::domain::{
    Assignment, AssignmentRepository, CreateAssignmentRepoInput, DeactivateAssignmentRepoInput,
    Device, DomainError, DomainResult, GetActiveAssignmentRepoInput, IsAssignedToUserRepoInput,
    ListActiveAssignmentsByUserRepoInput, OwnedDevice,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use tracing::{debug, instrument};

const ACTIVE_ASSIGNMENT_INDEX: &str = "assignments_one_active_per_device";

/// Assignment row for PostgreSQL storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub id: String,
    pub device_id: String,
    pub user_id: String,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
}

impl From<&Row> for AssignmentRow {
    fn from(row: &Row) -> Self {
        AssignmentRow {
            id: row.get(0),
            device_id: row.get(1),
            user_id: row.get(2),
            assigned_at: row.get(3),
            unassigned_at: row.get(4),
        }
    }
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            id: row.id,
            device_id: row.device_id,
            user_id: row.user_id,
            assigned_at: row.assigned_at,
            unassigned_at: row.unassigned_at,
        }
    }
}

/// Assignment joined with its device for per-user listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedDeviceRow {
    pub assignment: AssignmentRow,
    pub serial_number: String,
    pub issuer_common_name: String,
    pub device_created_at: DateTime<Utc>,
}

impl From<OwnedDeviceRow> for OwnedDevice {
    fn from(row: OwnedDeviceRow) -> Self {
        OwnedDevice {
            device: Device {
                id: row.assignment.device_id.clone(),
                serial_number: row.serial_number,
                issuer_common_name: row.issuer_common_name,
                created_at: row.device_created_at,
            },
            assignment: row.assignment.into(),
        }
    }
}

/// PostgreSQL implementation of AssignmentRepository trait
///
/// The partial unique index `assignments_one_active_per_device` is what keeps
/// a device to a single active owner; inserts are not preceded by a read.
#[derive(Clone)]
pub struct PostgresAssignmentRepository {
    client: PostgresClient,
}

impl PostgresAssignmentRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssignmentRepository for PostgresAssignmentRepository {
    #[instrument(skip(self, input), fields(device_id = %input.device_id, user_id = %input.user_id))]
    async fn create_assignment(
        &self,
        input: CreateAssignmentRepoInput,
    ) -> DomainResult<Assignment> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let result = conn
            .execute(
                "INSERT INTO assignments (id, device_id, user_id, assigned_at)
                 VALUES ($1, $2, $3, $4)",
                &[
                    &input.id,
                    &input.device_id,
                    &input.user_id,
                    &input.assigned_at,
                ],
            )
            .await;

        if let Err(e) = result {
            if let Some(db_err) = e.as_db_error() {
                match db_err.code().code() {
                    // unique_violation on the one-active-per-device index
                    "23505" if db_err.constraint() == Some(ACTIVE_ASSIGNMENT_INDEX) => {
                        return Err(DomainError::DeviceAlreadyAssigned(input.device_id));
                    }
                    // foreign_key_violation: device row does not exist
                    "23503" => return Err(DomainError::DeviceNotFound(input.device_id)),
                    _ => {}
                }
            }
            return Err(DomainError::RepositoryError(e.into()));
        }

        debug!("assigned device {} to user {}", input.device_id, input.user_id);

        Ok(Assignment {
            id: input.id,
            device_id: input.device_id,
            user_id: input.user_id,
            assigned_at: input.assigned_at,
            unassigned_at: None,
        })
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id))]
    async fn get_active_assignment(
        &self,
        input: GetActiveAssignmentRepoInput,
    ) -> DomainResult<Option<Assignment>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, device_id, user_id, assigned_at, unassigned_at
                 FROM assignments
                 WHERE device_id = $1 AND unassigned_at IS NULL",
                &[&input.device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| AssignmentRow::from(&row).into()))
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    async fn list_active_assignments_by_user(
        &self,
        input: ListActiveAssignmentsByUserRepoInput,
    ) -> DomainResult<Vec<OwnedDevice>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT a.id, a.device_id, a.user_id, a.assigned_at, a.unassigned_at,
                        d.serial_number, d.issuer_common_name, d.created_at
                 FROM assignments a
                 INNER JOIN devices d ON a.device_id = d.id
                 WHERE a.user_id = $1 AND a.unassigned_at IS NULL
                 ORDER BY a.assigned_at DESC",
                &[&input.user_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let owned = rows
            .iter()
            .map(|row| {
                OwnedDeviceRow {
                    assignment: AssignmentRow::from(row),
                    serial_number: row.get(5),
                    issuer_common_name: row.get(6),
                    device_created_at: row.get(7),
                }
                .into()
            })
            .collect();

        debug!(
            "found {} active assignments for user: {}",
            rows.len(),
            input.user_id
        );

        Ok(owned)
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id))]
    async fn deactivate_assignment(
        &self,
        input: DeactivateAssignmentRepoInput,
    ) -> DomainResult<Assignment> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // Owner check and close happen in one statement so a concurrent
        // unassign/assign pair cannot close someone else's interval.
        let row = conn
            .query_opt(
                "UPDATE assignments
                 SET unassigned_at = $3
                 WHERE device_id = $1
                   AND unassigned_at IS NULL
                   AND ($2::TEXT IS NULL OR user_id = $2)
                 RETURNING id, device_id, user_id, assigned_at, unassigned_at",
                &[&input.device_id, &input.expected_user_id, &input.unassigned_at],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let assignment: Assignment = AssignmentRow::from(&row).into();
                debug!(
                    "unassigned device {} from user {}",
                    assignment.device_id, assignment.user_id
                );
                Ok(assignment)
            }
            None => Err(DomainError::NoActiveAssignment(input.device_id)),
        }
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id))]
    async fn is_device_assigned(&self, input: GetActiveAssignmentRepoInput) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT EXISTS(
                    SELECT 1 FROM assignments
                    WHERE device_id = $1 AND unassigned_at IS NULL
                 )",
                &[&input.device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id, user_id = %input.user_id))]
    async fn is_device_assigned_to_user(
        &self,
        input: IsAssignedToUserRepoInput,
    ) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT EXISTS(
                    SELECT 1 FROM assignments
                    WHERE device_id = $1 AND user_id = $2 AND unassigned_at IS NULL
                 )",
                &[&input.device_id, &input.user_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }
}
