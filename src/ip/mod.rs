//! IP and MAC address allocation.
//!
//! This module hands out the addresses a device receives when it joins
//! the topology: sequential IPv4 addresses from a configured subnet and
//! MAC addresses under a fixed locally-administered OUI.

pub mod allocator;
pub mod mac;

// Re-export commonly used types
pub use allocator::{AddressAllocator, Subnet, DEFAULT_SUBNET};
pub use mac::{MacAddress, MacGenerator, MacPolicy, MAC_OUI};
