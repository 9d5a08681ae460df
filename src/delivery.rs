//! Simulated packet delivery.
//!
//! Delivering a packet means finding a path through the topology and
//! resolving the destination's MAC from the source. No bytes move; the
//! protocol tag and payload are carried through for reporting only.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::arp::ResolutionCache;
use crate::error::{EngineError, EngineResult};
use crate::ip::MacAddress;
use crate::topology::Topology;

/// Protocol label attached to a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    #[default]
    Generic,
}

impl Protocol {
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Generic => "GENERIC",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Protocol {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "icmp" | "ping" => Ok(Protocol::Icmp),
            "generic" => Ok(Protocol::Generic),
            _ => Err(EngineError::InvalidProtocol(s.to_string())),
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.label().to_string()
    }
}

/// A packet to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub source: String,
    pub destination: String,
    pub protocol: Protocol,
    /// Application data, recorded but never transmitted
    pub payload: Option<String>,
}

impl Packet {
    pub fn new(source: &str, destination: &str, protocol: Protocol) -> Self {
        Packet {
            source: source.to_string(),
            destination: destination.to_string(),
            protocol,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// What happened to a packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        /// Devices traversed, source and destination included
        path: Vec<String>,
        /// Destination MAC as resolved by the source
        mac: MacAddress,
        cache_hit: bool,
        payload_bytes: usize,
    },
    /// Source and destination are in different connected components
    NoRoute,
}

/// Report for one send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub protocol: Protocol,
    pub source: String,
    pub destination: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }

    pub fn path(&self) -> Option<&[String]> {
        match &self.outcome {
            DeliveryOutcome::Delivered { path, .. } => Some(path),
            DeliveryOutcome::NoRoute => None,
        }
    }

    pub fn mac(&self) -> Option<MacAddress> {
        match self.outcome {
            DeliveryOutcome::Delivered { mac, .. } => Some(mac),
            DeliveryOutcome::NoRoute => None,
        }
    }

    /// Number of links crossed
    pub fn hops(&self) -> Option<usize> {
        self.path().map(|p| p.len().saturating_sub(1))
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            DeliveryOutcome::Delivered { path, mac, cache_hit, payload_bytes } => {
                write!(
                    f,
                    "{} {} -> {}: delivered via {} ({} hop(s)), {} is at {} ({})",
                    self.protocol,
                    self.source,
                    self.destination,
                    path.join(" -> "),
                    path.len().saturating_sub(1),
                    self.destination,
                    mac,
                    if *cache_hit { "ARP cache" } else { "ARP exchange" },
                )?;
                if *payload_bytes > 0 {
                    write!(f, ", {} byte(s) of data", payload_bytes)?;
                }
                Ok(())
            }
            DeliveryOutcome::NoRoute => write!(
                f,
                "{} {} -> {}: failed, no route between devices",
                self.protocol, self.source, self.destination
            ),
        }
    }
}

/// Delivers packets over a topology, updating ARP state as it goes
pub struct DeliveryEngine<'a> {
    topology: &'a Topology,
    cache: &'a mut ResolutionCache,
}

impl<'a> DeliveryEngine<'a> {
    pub fn new(topology: &'a Topology, cache: &'a mut ResolutionCache) -> Self {
        DeliveryEngine { topology, cache }
    }

    pub fn send(&mut self, packet: &Packet) -> EngineResult<DeliveryResult> {
        let Packet { source, destination, protocol, payload } = packet;

        let Some(path) = self.topology.shortest_path(source, destination)? else {
            warn!("{} {} -> {}: no route", protocol, source, destination);
            return Ok(DeliveryResult {
                protocol: *protocol,
                source: source.clone(),
                destination: destination.clone(),
                outcome: DeliveryOutcome::NoRoute,
            });
        };

        let resolution = self.cache.resolve(self.topology, source, destination)?;
        let result = DeliveryResult {
            protocol: *protocol,
            source: source.clone(),
            destination: destination.clone(),
            outcome: DeliveryOutcome::Delivered {
                path,
                mac: resolution.mac,
                cache_hit: resolution.cache_hit,
                payload_bytes: payload.as_ref().map_or(0, String::len),
            },
        };
        info!("{}", result);
        Ok(result)
    }

    /// ICMP echo between two devices
    pub fn ping(&mut self, source: &str, destination: &str) -> EngineResult<DeliveryResult> {
        self.send(&Packet::new(source, destination, Protocol::Icmp))
    }
}
