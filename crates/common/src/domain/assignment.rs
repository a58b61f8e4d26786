use crate::domain::device::Device;
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ownership interval of a device.
///
/// Rows are never deleted; `unassigned_at` is set when the interval closes,
/// leaving a custody history per device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub device_id: String,
    pub user_id: String,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unassigned_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.unassigned_at.is_none()
    }
}

/// A device joined with its active assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedDevice {
    pub device: Device,
    pub assignment: Assignment,
}

/// Repository input for opening a new ownership interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAssignmentRepoInput {
    pub id: String,
    pub device_id: String,
    pub user_id: String,
    pub assigned_at: DateTime<Utc>,
}

/// Repository input for device-scoped assignment lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetActiveAssignmentRepoInput {
    pub device_id: String,
}

/// Repository input for listing a user's active assignments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListActiveAssignmentsByUserRepoInput {
    pub user_id: String,
}

/// Repository input for closing the active interval of a device.
///
/// When `expected_user_id` is set the row is only closed if that user is
/// still the owner, so the ownership check and the write are one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivateAssignmentRepoInput {
    pub device_id: String,
    pub expected_user_id: Option<String>,
    pub unassigned_at: DateTime<Utc>,
}

/// Repository input for checking ownership by a specific user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsAssignedToUserRepoInput {
    pub device_id: String,
    pub user_id: String,
}

/// Repository trait for assignment storage operations.
///
/// Implementations must guarantee at most one active assignment per device
/// under concurrent callers (constraint-backed insert or equivalent).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Insert an active assignment. Fails with `DeviceAlreadyAssigned` if the
    /// device already has one, or `DeviceNotFound` if the device does not exist.
    async fn create_assignment(&self, input: CreateAssignmentRepoInput)
        -> DomainResult<Assignment>;

    /// Get the active assignment of a device
    async fn get_active_assignment(
        &self,
        input: GetActiveAssignmentRepoInput,
    ) -> DomainResult<Option<Assignment>>;

    /// List a user's active assignments joined with their devices, newest first
    async fn list_active_assignments_by_user(
        &self,
        input: ListActiveAssignmentsByUserRepoInput,
    ) -> DomainResult<Vec<OwnedDevice>>;

    /// Close the active assignment of a device. Fails with `NoActiveAssignment`
    /// if there is none (or it belongs to someone other than `expected_user_id`).
    async fn deactivate_assignment(
        &self,
        input: DeactivateAssignmentRepoInput,
    ) -> DomainResult<Assignment>;

    /// Check whether a device currently has an owner
    async fn is_device_assigned(&self, input: GetActiveAssignmentRepoInput) -> DomainResult<bool>;

    /// Check whether a device is currently owned by the given user
    async fn is_device_assigned_to_user(
        &self,
        input: IsAssignedToUserRepoInput,
    ) -> DomainResult<bool>;
}
