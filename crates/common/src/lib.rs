pub mod auth;
pub mod domain;
pub mod garde;
pub mod memory;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use auth::MockAuthTokenProvider;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockAssignmentRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceRepository;
