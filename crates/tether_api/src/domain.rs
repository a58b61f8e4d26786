mod assignment_ledger;
mod authorization_gate;
mod device_registry;
mod device_service;

pub use assignment_ledger::*;
pub use authorization_gate::*;
pub use device_registry::*;
pub use device_service::*;
