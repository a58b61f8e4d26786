use crate::domain::AssignmentLedger;
use common::domain::{Assignment, DomainError, DomainResult};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Ownership-based access decisions.
///
/// Claiming an unowned device only needs an authenticated user, so there is
/// no check for assign here.
pub struct AuthorizationGate {
    ledger: Arc<AssignmentLedger>,
}

impl AuthorizationGate {
    pub fn new(ledger: Arc<AssignmentLedger>) -> Self {
        Self { ledger }
    }

    /// True iff the user is the device's current owner
    #[instrument(skip(self))]
    pub async fn can_modify(&self, device_id: &str, user_id: &str) -> DomainResult<bool> {
        self.ledger.is_owned_by(device_id, user_id).await
    }

    /// Fails with `Forbidden` unless the user is the device's current owner
    pub async fn require_owner(&self, device_id: &str, user_id: &str) -> DomainResult<()> {
        if self.can_modify(device_id, user_id).await? {
            Ok(())
        } else {
            debug!(device_id, user_id, "ownership check failed");
            Err(DomainError::Forbidden(format!(
                "device {} is not assigned to user {}",
                device_id, user_id
            )))
        }
    }

    /// Unowned devices are visible to any authenticated user, owned ones only to the owner
    pub fn can_view(active_assignment: Option<&Assignment>, user_id: &str) -> bool {
        active_assignment.map_or(true, |assignment| assignment.user_id == user_id)
    }
}
