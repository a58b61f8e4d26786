use crate::domain::{AssignmentLedger, AuthorizationGate, DeviceRegistry};
use common::auth::{extract_device_identity, validate_certificate};
use common::domain::{
    Assignment, AssignmentRepository, Device, DeviceRepository, DomainError, DomainResult,
    OwnedDevice,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Service request for viewing a device
#[derive(Debug, Clone, Validate)]
pub struct GetDeviceRequest {
    #[garde(length(min = 1))]
    pub user_id: String,
    #[garde(length(min = 1))]
    pub device_id: String,
}

/// Service request for claiming a device
#[derive(Debug, Clone, Validate)]
pub struct AssignDeviceRequest {
    #[garde(length(min = 1))]
    pub user_id: String,
    #[garde(length(min = 1))]
    pub device_id: String,
}

/// Service request for releasing a device
#[derive(Debug, Clone, Validate)]
pub struct UnassignDeviceRequest {
    #[garde(length(min = 1))]
    pub user_id: String,
    #[garde(length(min = 1))]
    pub device_id: String,
}

/// Service request for listing a user's devices
#[derive(Debug, Clone, Validate)]
pub struct ListOwnedDevicesRequest {
    #[garde(length(min = 1))]
    pub user_id: String,
}

/// A device together with its current assignment, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceView {
    pub device: Device,
    pub assignment: Option<Assignment>,
}

/// Domain service composing device registration and ownership.
///
/// Callers pass identities that are already authenticated: a peer
/// certificate from the TLS layer or a user id from a verified token.
pub struct DeviceService {
    registry: Arc<DeviceRegistry>,
    ledger: Arc<AssignmentLedger>,
    gate: AuthorizationGate,
}

impl DeviceService {
    pub fn new(
        device_repository: Arc<dyn DeviceRepository>,
        assignment_repository: Arc<dyn AssignmentRepository>,
    ) -> Self {
        let ledger = Arc::new(AssignmentLedger::new(assignment_repository));
        Self {
            registry: Arc::new(DeviceRegistry::new(device_repository)),
            gate: AuthorizationGate::new(ledger.clone()),
            ledger,
        }
    }

    /// Validate the peer certificate, derive the device identity and
    /// register the device on first contact
    #[instrument(skip(self, certificate))]
    pub async fn authenticate_device(&self, certificate: Option<&[u8]>) -> DomainResult<Device> {
        validate_certificate(certificate)?;
        let identity = extract_device_identity(certificate)?;

        debug!(serial_number = %identity.serial_number, issuer = %identity.issuer_common_name, "device certificate accepted");

        self.registry.register_or_get(identity).await
    }

    /// Device plus its current assignment. Devices owned by someone else are
    /// reported as not found.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, device_id = %request.device_id))]
    pub async fn get_device(&self, request: GetDeviceRequest) -> DomainResult<DeviceView> {
        common::garde::validate_request(&request)?;

        let device = self.registry.get_device(&request.device_id).await?;
        let assignment = self.ledger.active_assignment(&request.device_id).await?;

        if !AuthorizationGate::can_view(assignment.as_ref(), &request.user_id) {
            debug!("device owned by another user");
            return Err(DomainError::DeviceNotFound(request.device_id));
        }

        Ok(DeviceView { device, assignment })
    }

    /// Claim an unowned device for the requesting user
    #[instrument(skip(self, request), fields(user_id = %request.user_id, device_id = %request.device_id))]
    pub async fn assign_device(&self, request: AssignDeviceRequest) -> DomainResult<Assignment> {
        common::garde::validate_request(&request)?;

        self.registry.get_device(&request.device_id).await?;

        self.ledger
            .assign(&request.device_id, &request.user_id)
            .await
    }

    /// Release a device owned by the requesting user. A missing device and a
    /// device owned by someone else both fail with `Forbidden`.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, device_id = %request.device_id))]
    pub async fn unassign_device(
        &self,
        request: UnassignDeviceRequest,
    ) -> DomainResult<Assignment> {
        common::garde::validate_request(&request)?;

        self.gate
            .require_owner(&request.device_id, &request.user_id)
            .await?;

        // Ownership may change between the check and the close; the close
        // itself is conditional on the owner, so a lost race reads as forbidden.
        match self
            .ledger
            .unassign(&request.device_id, Some(&request.user_id))
            .await
        {
            Err(DomainError::NoActiveAssignment(device_id)) => Err(DomainError::Forbidden(
                format!("device {} is not assigned to user {}", device_id, request.user_id),
            )),
            other => other,
        }
    }

    /// Devices currently owned by the requesting user, newest assignment first
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn list_owned_devices(
        &self,
        request: ListOwnedDevicesRequest,
    ) -> DomainResult<Vec<OwnedDevice>> {
        common::garde::validate_request(&request)?;

        self.ledger.owned_by(&request.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::{MockAssignmentRepository, MockDeviceRepository};

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            serial_number: "ABC123".to_string(),
            issuer_common_name: "TestCA".to_string(),
            created_at: Utc::now(),
        }
    }

    fn assignment(device_id: &str, user_id: &str) -> Assignment {
        Assignment {
            id: "asg-1".to_string(),
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            assigned_at: Utc::now(),
            unassigned_at: None,
        }
    }

    fn service(
        device_repo: MockDeviceRepository,
        assignment_repo: MockAssignmentRepository,
    ) -> DeviceService {
        DeviceService::new(Arc::new(device_repo), Arc::new(assignment_repo))
    }

    #[tokio::test]
    async fn test_authenticate_rejects_missing_certificate() {
        let mut device_repo = MockDeviceRepository::new();
        device_repo.expect_get_device_by_serial().times(0);
        device_repo.expect_create_device().times(0);

        let service = service(device_repo, MockAssignmentRepository::new());
        let result = service.authenticate_device(None).await;

        assert!(matches!(result, Err(DomainError::InvalidCertificate(_))));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_garbage_certificate() {
        let mut device_repo = MockDeviceRepository::new();
        device_repo.expect_get_device_by_serial().times(0);

        let service = service(device_repo, MockAssignmentRepository::new());
        let result = service.authenticate_device(Some(b"not a certificate".as_slice())).await;

        assert!(matches!(result, Err(DomainError::InvalidCertificate(_))));
    }

    #[tokio::test]
    async fn test_assign_unknown_device_not_found() {
        let mut device_repo = MockDeviceRepository::new();
        device_repo
            .expect_get_device()
            .times(1)
            .return_once(|_| Ok(None));
        let mut assignment_repo = MockAssignmentRepository::new();
        assignment_repo.expect_create_assignment().times(0);

        let service = service(device_repo, assignment_repo);
        let result = service
            .assign_device(AssignDeviceRequest {
                user_id: "alice".to_string(),
                device_id: "missing".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_assign_already_assigned_is_distinct_from_not_found() {
        let mut device_repo = MockDeviceRepository::new();
        device_repo
            .expect_get_device()
            .times(1)
            .return_once(|_| Ok(Some(device("dev-1"))));
        let mut assignment_repo = MockAssignmentRepository::new();
        assignment_repo
            .expect_create_assignment()
            .times(1)
            .return_once(|input| Err(DomainError::DeviceAlreadyAssigned(input.device_id)));

        let service = service(device_repo, assignment_repo);
        let result = service
            .assign_device(AssignDeviceRequest {
                user_id: "bob".to_string(),
                device_id: "dev-1".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::DeviceAlreadyAssigned(_))));
    }

    #[tokio::test]
    async fn test_assign_validation_error() {
        let mut device_repo = MockDeviceRepository::new();
        device_repo.expect_get_device().times(0);

        let service = service(device_repo, MockAssignmentRepository::new());
        let result = service
            .assign_device(AssignDeviceRequest {
                user_id: "alice".to_string(),
                device_id: "".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_unassign_by_non_owner_forbidden() {
        let mut assignment_repo = MockAssignmentRepository::new();
        assignment_repo
            .expect_is_device_assigned_to_user()
            .times(1)
            .return_once(|_| Ok(false));
        assignment_repo.expect_deactivate_assignment().times(0);

        let service = service(MockDeviceRepository::new(), assignment_repo);
        let result = service
            .unassign_device(UnassignDeviceRequest {
                user_id: "bob".to_string(),
                device_id: "dev-1".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_unassign_lost_race_reads_as_forbidden() {
        let mut assignment_repo = MockAssignmentRepository::new();
        assignment_repo
            .expect_is_device_assigned_to_user()
            .times(1)
            .return_once(|_| Ok(true));
        assignment_repo
            .expect_deactivate_assignment()
            .withf(|input| input.expected_user_id.as_deref() == Some("alice"))
            .times(1)
            .return_once(|input| Err(DomainError::NoActiveAssignment(input.device_id)));

        let service = service(MockDeviceRepository::new(), assignment_repo);
        let result = service
            .unassign_device(UnassignDeviceRequest {
                user_id: "alice".to_string(),
                device_id: "dev-1".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_device_hidden_when_owned_by_other_user() {
        let mut device_repo = MockDeviceRepository::new();
        device_repo
            .expect_get_device()
            .times(2)
            .returning(|input| Ok(Some(device(&input.device_id))));
        let mut assignment_repo = MockAssignmentRepository::new();
        assignment_repo
            .expect_get_active_assignment()
            .times(2)
            .returning(|input| Ok(Some(assignment(&input.device_id, "alice"))));

        let service = service(device_repo, assignment_repo);

        let owner_view = service
            .get_device(GetDeviceRequest {
                user_id: "alice".to_string(),
                device_id: "dev-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(owner_view.device.id, "dev-1");
        assert_eq!(
            owner_view.assignment.map(|a| a.user_id),
            Some("alice".to_string())
        );

        let other = service
            .get_device(GetDeviceRequest {
                user_id: "bob".to_string(),
                device_id: "dev-1".to_string(),
            })
            .await;
        assert!(matches!(other, Err(DomainError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_unowned_device_visible() {
        let mut device_repo = MockDeviceRepository::new();
        device_repo
            .expect_get_device()
            .times(1)
            .return_once(|_| Ok(Some(device("dev-1"))));
        let mut assignment_repo = MockAssignmentRepository::new();
        assignment_repo
            .expect_get_active_assignment()
            .times(1)
            .return_once(|_| Ok(None));

        let service = service(device_repo, assignment_repo);
        let view = service
            .get_device(GetDeviceRequest {
                user_id: "bob".to_string(),
                device_id: "dev-1".to_string(),
            })
            .await
            .unwrap();

        assert!(view.assignment.is_none());
    }
}
