//! Network topology module.
//!
//! This module holds the device graph: device metadata, links and
//! shortest-path search over the undirected topology.

pub mod graph;
pub mod types;

// Re-export key types for easier access
pub use graph::Topology;
pub use types::{Device, DeviceKind, Link};
