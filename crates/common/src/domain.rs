mod assignment;
mod device;
mod result;

pub use assignment::*;
pub use device::*;
pub use result::*;
