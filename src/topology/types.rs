//! Topology type definitions.
//!
//! Devices and the links between them. Both are immutable once created;
//! a device only changes by being removed.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ip::MacAddress;

/// Kind of simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceKind {
    Pc,
    Router,
    Server,
    Switch,
}

impl DeviceKind {
    /// Label used for display and for default device names (`PC0`, `Router1`, ...)
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Pc => "PC",
            DeviceKind::Router => "Router",
            DeviceKind::Server => "Server",
            DeviceKind::Switch => "Switch",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DeviceKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pc" => Ok(DeviceKind::Pc),
            "router" => Ok(DeviceKind::Router),
            "server" => Ok(DeviceKind::Server),
            "switch" => Ok(DeviceKind::Switch),
            _ => Err(EngineError::InvalidDeviceKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for DeviceKind {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceKind> for String {
    fn from(kind: DeviceKind) -> Self {
        kind.label().to_string()
    }
}

/// A device attached to the simulated network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub name: String,
    pub kind: DeviceKind,
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) ip={} mac={}", self.name, self.kind, self.ip, self.mac)
    }
}

/// An undirected link between two devices
///
/// Endpoints are stored in the order the link was created; equality ignores order.
#[derive(Debug, Clone, Eq, Serialize)]
pub struct Link {
    pub a: String,
    pub b: String,
}

impl Link {
    pub fn new(a: &str, b: &str) -> Self {
        Link {
            a: a.to_string(),
            b: b.to_string(),
        }
    }

    pub fn connects(&self, x: &str, y: &str) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    pub fn touches(&self, name: &str) -> bool {
        self.a == name || self.b == name
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.connects(&other.a, &other.b)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}
