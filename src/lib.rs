//! # vnetsim - Virtual computer network simulator
//!
//! This library models a small virtual network: devices, the links between
//! them, address assignment, ARP caching and simulated packet delivery over
//! the resulting topology.
//!
//! ## Overview
//!
//! An [`engine::Engine`] owns one topology. Devices (PCs, routers, servers,
//! switches) receive a sequential IPv4 address from the configured subnet
//! and a MAC under the `00:16:3e` OUI. Sending a packet finds the shortest
//! path through the undirected topology and resolves the destination's MAC,
//! filling the ARP tables of both ends. No bytes are actually transmitted.
//!
//! ## Architecture
//!
//! - `ip`: IP and MAC address allocation
//! - `topology`: device graph, links and shortest paths
//! - `arp`: per-device resolution caches
//! - `delivery`: path + resolution into a delivery outcome
//! - `engine`: the command surface, single-owner and lock-shared variants
//! - `command`: typed commands, parsed from YAML or shell lines
//! - `scenario`: YAML scenario files and JSON run reports
//! - `config` / `config_loader`: engine configuration
//! - `utils`: CIDR helpers and input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use vnetsim::engine::Engine;
//! use vnetsim::delivery::Protocol;
//! use vnetsim::topology::DeviceKind;
//!
//! let mut engine = Engine::default();
//! engine.add_device(DeviceKind::Pc, Some("PC0"))?;
//! engine.add_device(DeviceKind::Router, Some("Router0"))?;
//! engine.add_device(DeviceKind::Server, Some("Server0"))?;
//! engine.link("PC0", "Router0")?;
//! engine.link("Router0", "Server0")?;
//!
//! let result = engine.send("PC0", "Server0", Protocol::Tcp)?;
//! assert_eq!(result.path().unwrap(), ["PC0", "Router0", "Server0"]);
//! # Ok::<(), vnetsim::error::EngineError>(())
//! ```
//!
//! ## Error Handling
//!
//! Engine operations return [`error::EngineError`]; a failed command leaves
//! the engine unchanged. An unreachable destination is not an error but a
//! [`delivery::DeliveryOutcome::NoRoute`] result. File loading and the
//! binary use `color_eyre` for context-rich reports.

pub mod arp;
pub mod command;
pub mod config;
pub mod config_loader;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod ip;
pub mod scenario;
pub mod topology;
pub mod utils;
