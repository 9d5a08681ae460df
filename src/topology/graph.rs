//! Device graph.
//!
//! The topology keeps devices by name and an adjacency list per device.
//! Neighbour lists are ordered by link creation, and breadth-first search
//! visits them in that order, so among equally short paths the one through
//! the earliest-created links wins.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;

use log::{debug, info};

use super::types::{Device, DeviceKind, Link};
use crate::error::{EngineError, EngineResult};
use crate::ip::{AddressAllocator, Subnet};
use crate::utils::validation::validate_device_name;

/// Undirected graph of devices and links
#[derive(Debug, Default)]
pub struct Topology {
    devices: HashMap<String, Device>,
    /// device name -> neighbour names, in link-creation order
    adjacency: HashMap<String, Vec<String>>,
    /// All links, in creation order
    links: Vec<Link>,
    allocator: AddressAllocator,
    /// Successful additions since the last reset, used for default names
    added: u64,
}

impl Topology {
    pub fn new(allocator: AddressAllocator) -> Self {
        Topology {
            devices: HashMap::new(),
            adjacency: HashMap::new(),
            links: Vec::new(),
            allocator,
            added: 0,
        }
    }

    pub fn subnet(&self) -> Subnet {
        self.allocator.subnet()
    }

    pub fn allocator(&self) -> &AddressAllocator {
        &self.allocator
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    /// Look up a device, failing with `UnknownDevice`
    pub fn require(&self, name: &str) -> EngineResult<&Device> {
        self.devices.get(name).ok_or_else(|| EngineError::unknown(name))
    }

    /// All devices in allocation order
    pub fn devices(&self) -> Vec<&Device> {
        let mut devices: Vec<&Device> = self.devices.values().collect();
        // IPs are handed out in ascending order and never reused
        devices.sort_by_key(|d| d.ip);
        devices
    }

    /// All links in creation order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn neighbors(&self, name: &str) -> EngineResult<&[String]> {
        self.adjacency
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::unknown(name))
    }

    pub fn find_by_ip(&self, ip: Ipv4Addr) -> Option<&Device> {
        self.devices.values().find(|d| d.ip == ip)
    }

    /// Name a device of `kind` would get if none was requested
    ///
    /// Follows the `<Kind><n>` pattern where `n` counts successful additions,
    /// skipping names that are already taken.
    pub fn default_name(&self, kind: DeviceKind) -> String {
        let mut n = self.added;
        loop {
            let candidate = format!("{}{}", kind.label(), n);
            if !self.devices.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Add a device, allocating its IP and MAC
    pub fn add_device(&mut self, name: &str, kind: DeviceKind) -> EngineResult<Device> {
        validate_device_name(name)?;
        if self.devices.contains_key(name) {
            return Err(EngineError::DuplicateName { name: name.to_string() });
        }

        let (ip, mac) = self.allocator.allocate()?;
        let device = Device {
            name: name.to_string(),
            kind,
            ip,
            mac,
        };

        self.devices.insert(name.to_string(), device.clone());
        self.adjacency.insert(name.to_string(), Vec::new());
        self.added += 1;

        info!("Added {}", device);
        Ok(device)
    }

    /// Remove a device together with every link touching it
    pub fn remove_device(&mut self, name: &str) -> EngineResult<Device> {
        let device = self.devices.remove(name).ok_or_else(|| EngineError::unknown(name))?;

        let neighbors = self.adjacency.remove(name).unwrap_or_default();
        for neighbor in &neighbors {
            if let Some(list) = self.adjacency.get_mut(neighbor) {
                list.retain(|n| n != name);
            }
        }
        self.links.retain(|link| !link.touches(name));

        info!("Removed device {} and {} incident link(s)", name, neighbors.len());
        Ok(device)
    }

    /// Connect two devices with an undirected link
    pub fn link(&mut self, a: &str, b: &str) -> EngineResult<()> {
        self.require(a)?;
        self.require(b)?;
        if a == b {
            return Err(EngineError::SelfLink { name: a.to_string() });
        }
        if self.links.iter().any(|link| link.connects(a, b)) {
            return Err(EngineError::DuplicateLink {
                a: a.to_string(),
                b: b.to_string(),
            });
        }

        self.adjacency.entry(a.to_string()).or_default().push(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().push(a.to_string());
        self.links.push(Link::new(a, b));

        info!("Linked {} and {}", a, b);
        Ok(())
    }

    /// True iff `a` and `b` are directly linked
    pub fn has_edge(&self, a: &str, b: &str) -> EngineResult<bool> {
        let neighbors = self.neighbors(a)?;
        self.require(b)?;
        Ok(neighbors.iter().any(|n| n == b))
    }

    /// Shortest path from `a` to `b`, both endpoints included
    ///
    /// Returns `Ok(None)` when the devices sit in different connected
    /// components. A path from a device to itself is `[a]`.
    pub fn shortest_path(&self, a: &str, b: &str) -> EngineResult<Option<Vec<String>>> {
        self.require(a)?;
        self.require(b)?;

        let mut visited: HashSet<&str> = HashSet::from([a]);
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::from([a]);

        while let Some(node) = queue.pop_front() {
            if node == b {
                let mut path = vec![b.to_string()];
                let mut current = b;
                while let Some(&prev) = parent.get(current) {
                    path.push(prev.to_string());
                    current = prev;
                }
                path.reverse();
                debug!("Shortest path {} -> {}: {}", a, b, path.join(" -> "));
                return Ok(Some(path));
            }

            for neighbor in self.adjacency.get(node).into_iter().flatten() {
                if visited.insert(neighbor.as_str()) {
                    parent.insert(neighbor.as_str(), node);
                    queue.push_back(neighbor.as_str());
                }
            }
        }

        debug!("No route between {} and {}", a, b);
        Ok(None)
    }

    /// Drop every device and link and rewind address allocation
    pub fn reset(&mut self) {
        self.devices.clear();
        self.adjacency.clear();
        self.links.clear();
        self.allocator.reset();
        self.added = 0;
    }
}
