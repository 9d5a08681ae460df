//! Shared utilities: CIDR handling and input validation.

pub mod ip_utils;
pub mod validation;

pub use ip_utils::parse_cidr;
pub use validation::validate_device_name;
