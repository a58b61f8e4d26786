mod certificate;
mod config;
mod context;
mod jwt;
mod traits;

pub use certificate::*;
pub use config::*;
pub use context::*;
pub use jwt::*;
pub use traits::*;

#[cfg(any(test, feature = "testing"))]
pub use traits::MockAuthTokenProvider;
