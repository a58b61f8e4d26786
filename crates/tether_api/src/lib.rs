pub mod domain;
pub mod http;
pub mod tether_api;

pub use domain::*;
pub use tether_api::*;
