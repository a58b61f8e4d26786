use chrono::Utc;
use common::domain::{
    Assignment, AssignmentRepository, CreateAssignmentRepoInput, DeactivateAssignmentRepoInput,
    DomainResult, GetActiveAssignmentRepoInput, IsAssignedToUserRepoInput,
    ListActiveAssignmentsByUserRepoInput, OwnedDevice,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Append-only history of device ownership intervals.
///
/// Per device the state is either unowned or owned by exactly one user. Both
/// transitions are single storage operations: `assign` is a constraint-backed
/// insert and `unassign` a conditional close, so no read precedes a write.
pub struct AssignmentLedger {
    assignment_repository: Arc<dyn AssignmentRepository>,
}

impl AssignmentLedger {
    pub fn new(assignment_repository: Arc<dyn AssignmentRepository>) -> Self {
        Self {
            assignment_repository,
        }
    }

    /// Open an ownership interval. Fails with `DeviceAlreadyAssigned` if the
    /// device is owned, including when a concurrent assign won the race.
    #[instrument(skip(self))]
    pub async fn assign(&self, device_id: &str, user_id: &str) -> DomainResult<Assignment> {
        let repo_input = CreateAssignmentRepoInput {
            id: xid::new().to_string(),
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            assigned_at: Utc::now(),
        };

        let assignment = self
            .assignment_repository
            .create_assignment(repo_input)
            .await?;

        info!(assignment_id = %assignment.id, "device assigned");
        Ok(assignment)
    }

    /// Close the active interval. With `expected_owner` set, only that user's
    /// interval is closed; otherwise fails with `NoActiveAssignment`.
    #[instrument(skip(self))]
    pub async fn unassign(
        &self,
        device_id: &str,
        expected_owner: Option<&str>,
    ) -> DomainResult<Assignment> {
        let assignment = self
            .assignment_repository
            .deactivate_assignment(DeactivateAssignmentRepoInput {
                device_id: device_id.to_string(),
                expected_user_id: expected_owner.map(str::to_string),
                unassigned_at: Utc::now(),
            })
            .await?;

        info!(
            assignment_id = %assignment.id,
            user_id = %assignment.user_id,
            "device unassigned"
        );
        Ok(assignment)
    }

    /// The active interval of a device, if any
    pub async fn active_assignment(&self, device_id: &str) -> DomainResult<Option<Assignment>> {
        self.assignment_repository
            .get_active_assignment(GetActiveAssignmentRepoInput {
                device_id: device_id.to_string(),
            })
            .await
    }

    /// User id of the current owner
    pub async fn current_owner(&self, device_id: &str) -> DomainResult<Option<String>> {
        Ok(self
            .active_assignment(device_id)
            .await?
            .map(|assignment| assignment.user_id))
    }

    /// Devices actively owned by a user, most recently assigned first
    #[instrument(skip(self))]
    pub async fn owned_by(&self, user_id: &str) -> DomainResult<Vec<OwnedDevice>> {
        let owned = self
            .assignment_repository
            .list_active_assignments_by_user(ListActiveAssignmentsByUserRepoInput {
                user_id: user_id.to_string(),
            })
            .await?;

        debug!(count = owned.len(), "listed owned devices");
        Ok(owned)
    }

    pub async fn is_owned_by(&self, device_id: &str, user_id: &str) -> DomainResult<bool> {
        self.assignment_repository
            .is_device_assigned_to_user(IsAssignedToUserRepoInput {
                device_id: device_id.to_string(),
                user_id: user_id.to_string(),
            })
            .await
    }
}
