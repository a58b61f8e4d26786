mod error;
mod handlers;
mod logging;
mod router;
mod server;

pub use error::*;
pub use handlers::*;
pub use logging::*;
pub use router::*;
pub use server::*;
