//! Address resolution (ARP) cache.
//!
//! Each device keeps a table of peer name -> MAC, filled the first time it
//! talks to that peer. A resolution emulates the broadcast request and the
//! unicast reply, so both ends learn each other's address in one step.
//! Device addresses never change, so entries never go stale; they only
//! disappear when a device is removed or the topology is reset.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use log::debug;
use serde::Serialize;

use crate::error::EngineResult;
use crate::ip::MacAddress;
use crate::topology::Topology;

/// Outcome of [`ResolutionCache::resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub mac: MacAddress,
    /// True if the answer came from the source's table without a new exchange
    pub cache_hit: bool,
}

/// A single row of a device's table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArpEntry {
    pub peer: String,
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

/// Reply to a "who has <ip>?" query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WhoHasReply {
    /// Some device has resolved the owner of `ip`
    Known { ip: Ipv4Addr, name: String, mac: MacAddress },
    /// Nobody has resolved `ip` yet; the request goes unanswered
    Unanswered { ip: Ipv4Addr },
    /// `ip` is outside the topology's subnet, so no request is broadcast
    OffSubnet { ip: Ipv4Addr, subnet: String },
}

/// Per-device resolution tables
#[derive(Debug, Default)]
pub struct ResolutionCache {
    tables: HashMap<String, HashMap<String, MacAddress>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty table for a newly added device
    pub fn init(&mut self, name: &str) {
        self.tables.entry(name.to_string()).or_default();
    }

    /// Resolve `destination`'s MAC on behalf of `source`
    pub fn resolve(
        &mut self,
        topology: &Topology,
        source: &str,
        destination: &str,
    ) -> EngineResult<Resolution> {
        let src = topology.require(source)?;
        let dst = topology.require(destination)?;

        if source == destination {
            // loopback, nothing to learn
            return Ok(Resolution { mac: src.mac, cache_hit: false });
        }

        if let Some(&mac) = self.tables.get(source).and_then(|t| t.get(destination)) {
            debug!("ARP cache hit on {}: {} is at {}", source, destination, mac);
            return Ok(Resolution { mac, cache_hit: true });
        }

        debug!(
            "ARP request from {}: who has {}? Reply: {} is at {}",
            source, dst.ip, dst.ip, dst.mac
        );
        self.tables
            .entry(source.to_string())
            .or_default()
            .insert(destination.to_string(), dst.mac);
        self.tables
            .entry(destination.to_string())
            .or_default()
            .insert(source.to_string(), src.mac);

        Ok(Resolution { mac: dst.mac, cache_hit: false })
    }

    /// Forget a device: its own table and every entry pointing at it
    pub fn purge(&mut self, name: &str) {
        self.tables.remove(name);
        for table in self.tables.values_mut() {
            table.remove(name);
        }
    }

    pub fn lookup(&self, owner: &str, peer: &str) -> Option<MacAddress> {
        self.tables.get(owner)?.get(peer).copied()
    }

    /// Entries of `owner`'s table sorted by peer name, or `None` if `owner`
    /// has no table
    pub fn table(&self, topology: &Topology, owner: &str) -> Option<Vec<ArpEntry>> {
        let table = self.tables.get(owner)?;
        let mut entries: Vec<ArpEntry> = table
            .iter()
            .filter_map(|(peer, mac)| {
                topology.device(peer).map(|device| ArpEntry {
                    peer: peer.clone(),
                    ip: device.ip,
                    mac: *mac,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.peer.cmp(&b.peer));
        Some(entries)
    }

    /// Answer "who has `ip`?" from what the network has already learned
    pub fn who_has(&self, topology: &Topology, ip: Ipv4Addr) -> WhoHasReply {
        let subnet = topology.subnet();
        if !subnet.contains(ip) {
            return WhoHasReply::OffSubnet { ip, subnet: subnet.to_string() };
        }
        let Some(device) = topology.find_by_ip(ip) else {
            return WhoHasReply::Unanswered { ip };
        };
        let learned = self
            .tables
            .values()
            .find_map(|table| table.get(&device.name).copied());
        match learned {
            Some(mac) => WhoHasReply::Known {
                ip,
                name: device.name.clone(),
                mac,
            },
            None => WhoHasReply::Unanswered { ip },
        }
    }

    /// Total number of cached entries across all devices
    pub fn entry_count(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
