mod assignment_repository;
mod client;
mod config;
mod device_repository;

pub use assignment_repository::*;
pub use client::*;
pub use config::*;
pub use device_repository::*;
