//! In-memory storage backend.
//!
//! Implements both repository traits over a single lock so every operation is
//! atomic with respect to every other. Used by tests and local development.

use crate::domain::{
    Assignment, AssignmentRepository, CreateAssignmentRepoInput, CreateDeviceRepoInput,
    DeactivateAssignmentRepoInput, Device, DeviceRepository, DomainError, DomainResult,
    GetActiveAssignmentRepoInput, GetDeviceBySerialRepoInput, GetDeviceRepoInput,
    IsAssignedToUserRepoInput, ListActiveAssignmentsByUserRepoInput, OwnedDevice,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    devices: HashMap<String, Device>,
    serial_index: HashMap<String, String>,
    // Full custody history, in insertion order
    assignments: Vec<Assignment>,
    // device_id -> index into `assignments` of the open interval
    active: HashMap<String, usize>,
}

/// Thread-safe in-memory store for devices and assignments
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full custody history of a device, oldest first
    pub async fn assignment_history(&self, device_id: &str) -> Vec<Assignment> {
        let state = self.state.read().await;
        state
            .assignments
            .iter()
            .filter(|a| a.device_id == device_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DeviceRepository for InMemoryStore {
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let mut state = self.state.write().await;

        if state.serial_index.contains_key(&input.serial_number) {
            return Err(DomainError::DuplicateSerial(input.serial_number));
        }

        let device = Device {
            id: input.id,
            serial_number: input.serial_number,
            issuer_common_name: input.issuer_common_name,
            created_at: input.created_at,
        };
        state
            .serial_index
            .insert(device.serial_number.clone(), device.id.clone());
        state.devices.insert(device.id.clone(), device.clone());

        debug!("registered device: {}", device.id);
        Ok(device)
    }

    async fn get_device(&self, input: GetDeviceRepoInput) -> DomainResult<Option<Device>> {
        let state = self.state.read().await;
        Ok(state.devices.get(&input.device_id).cloned())
    }

    async fn get_device_by_serial(
        &self,
        input: GetDeviceBySerialRepoInput,
    ) -> DomainResult<Option<Device>> {
        let state = self.state.read().await;
        Ok(state
            .serial_index
            .get(&input.serial_number)
            .and_then(|id| state.devices.get(id))
            .cloned())
    }

    async fn device_exists_by_serial(
        &self,
        input: GetDeviceBySerialRepoInput,
    ) -> DomainResult<bool> {
        let state = self.state.read().await;
        Ok(state.serial_index.contains_key(&input.serial_number))
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryStore {
    async fn create_assignment(
        &self,
        input: CreateAssignmentRepoInput,
    ) -> DomainResult<Assignment> {
        let mut state = self.state.write().await;

        if !state.devices.contains_key(&input.device_id) {
            return Err(DomainError::DeviceNotFound(input.device_id));
        }
        if state.active.contains_key(&input.device_id) {
            return Err(DomainError::DeviceAlreadyAssigned(input.device_id));
        }

        let assignment = Assignment {
            id: input.id,
            device_id: input.device_id,
            user_id: input.user_id,
            assigned_at: input.assigned_at,
            unassigned_at: None,
        };
        let index = state.assignments.len();
        state.assignments.push(assignment.clone());
        state.active.insert(assignment.device_id.clone(), index);

        debug!(
            "assigned device {} to user {}",
            assignment.device_id, assignment.user_id
        );
        Ok(assignment)
    }

    async fn get_active_assignment(
        &self,
        input: GetActiveAssignmentRepoInput,
    ) -> DomainResult<Option<Assignment>> {
        let state = self.state.read().await;
        Ok(state
            .active
            .get(&input.device_id)
            .map(|&i| state.assignments[i].clone()))
    }

    async fn list_active_assignments_by_user(
        &self,
        input: ListActiveAssignmentsByUserRepoInput,
    ) -> DomainResult<Vec<OwnedDevice>> {
        let state = self.state.read().await;

        let mut owned: Vec<OwnedDevice> = state
            .active
            .values()
            .map(|&i| &state.assignments[i])
            .filter(|a| a.user_id == input.user_id)
            .filter_map(|a| {
                state.devices.get(&a.device_id).map(|device| OwnedDevice {
                    device: device.clone(),
                    assignment: a.clone(),
                })
            })
            .collect();
        owned.sort_by(|a, b| b.assignment.assigned_at.cmp(&a.assignment.assigned_at));

        Ok(owned)
    }

    async fn deactivate_assignment(
        &self,
        input: DeactivateAssignmentRepoInput,
    ) -> DomainResult<Assignment> {
        let mut state = self.state.write().await;

        let index = match state.active.get(&input.device_id) {
            Some(&i) => i,
            None => return Err(DomainError::NoActiveAssignment(input.device_id)),
        };
        if let Some(expected) = &input.expected_user_id {
            if &state.assignments[index].user_id != expected {
                return Err(DomainError::NoActiveAssignment(input.device_id));
            }
        }

        state.active.remove(&input.device_id);
        let assignment = &mut state.assignments[index];
        assignment.unassigned_at = Some(input.unassigned_at);

        debug!(
            "unassigned device {} from user {}",
            assignment.device_id, assignment.user_id
        );
        Ok(assignment.clone())
    }

    async fn is_device_assigned(&self, input: GetActiveAssignmentRepoInput) -> DomainResult<bool> {
        let state = self.state.read().await;
        Ok(state.active.contains_key(&input.device_id))
    }

    async fn is_device_assigned_to_user(
        &self,
        input: IsAssignedToUserRepoInput,
    ) -> DomainResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .active
            .get(&input.device_id)
            .is_some_and(|&i| state.assignments[i].user_id == input.user_id))
    }
}
