//! IP address allocation logic.
//!
//! Addresses are handed out sequentially from the configured subnet,
//! starting at offset 1 (offset 0 is the network address) and stopping
//! before the broadcast address. Addresses of removed devices are never
//! returned to the pool.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use log::debug;

use super::mac::{MacAddress, MacGenerator, MacPolicy};
use crate::error::{EngineError, EngineResult};
use crate::utils::ip_utils::{block_size, format_with_prefix, parse_cidr, prefix_mask};

/// Default subnet for a fresh topology
pub const DEFAULT_SUBNET: &str = "192.168.0.0/24";

/// An IPv4 network block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Subnet {
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self, String> {
        if prefix_len > 32 {
            return Err(format!("Prefix length {} is out of range", prefix_len));
        }
        if u32::from(network) & !prefix_mask(prefix_len) != 0 {
            return Err(format!("{} has host bits set for a /{} network", network, prefix_len));
        }
        Ok(Subnet { network, prefix_len })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Total addresses in the block, network and broadcast included
    pub fn size(&self) -> u64 {
        block_size(self.prefix_len)
    }

    /// Usable host addresses (`size - 2`)
    pub fn host_count(&self) -> u64 {
        self.size().saturating_sub(2)
    }

    /// True if `ip` lies inside this block
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & prefix_mask(self.prefix_len) == u32::from(self.network)
    }

    fn address_at(&self, offset: u64) -> Ipv4Addr {
        // offset < size() <= 2^32, so the sum stays inside the block
        Ipv4Addr::from(u32::from(self.network) + offset as u32)
    }
}

impl Default for Subnet {
    fn default() -> Self {
        Subnet {
            network: Ipv4Addr::new(192, 168, 0, 0),
            prefix_len: 24,
        }
    }
}

impl FromStr for Subnet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (network, prefix_len) = parse_cidr(s)?;
        Subnet::new(network, prefix_len)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_with_prefix(self.network, self.prefix_len))
    }
}

/// Hands out IP and MAC addresses for one topology
#[derive(Debug)]
pub struct AddressAllocator {
    subnet: Subnet,
    /// Offset of the next IP to hand out
    cursor: u64,
    macs: MacGenerator,
}

impl AddressAllocator {
    pub fn new(subnet: Subnet, mac_policy: MacPolicy, mac_seed: Option<u64>) -> Self {
        AddressAllocator {
            subnet,
            cursor: 1,
            macs: MacGenerator::new(mac_policy, mac_seed),
        }
    }

    pub fn subnet(&self) -> Subnet {
        self.subnet
    }

    /// Host addresses not yet handed out
    pub fn remaining_hosts(&self) -> u64 {
        self.broadcast_offset().saturating_sub(self.cursor)
    }

    fn broadcast_offset(&self) -> u64 {
        self.subnet.size() - 1
    }

    fn ensure_ip_available(&self) -> EngineResult<()> {
        if self.cursor >= self.broadcast_offset() {
            return Err(EngineError::AddressSpaceExhausted {
                reason: format!(
                    "all {} host addresses of {} are allocated",
                    self.subnet.host_count(),
                    self.subnet
                ),
            });
        }
        Ok(())
    }

    /// Next unused address of the subnet, in ascending order
    pub fn allocate_ip(&mut self) -> EngineResult<Ipv4Addr> {
        self.ensure_ip_available()?;
        let ip = self.subnet.address_at(self.cursor);
        self.cursor += 1;
        debug!(
            "Allocated IP {} ({} hosts remaining in {})",
            ip,
            self.remaining_hosts(),
            self.subnet
        );
        Ok(ip)
    }

    pub fn allocate_mac(&mut self) -> EngineResult<MacAddress> {
        self.macs.next_mac()
    }

    /// Allocate an IP and a MAC together; on failure neither cursor moves
    pub fn allocate(&mut self) -> EngineResult<(Ipv4Addr, MacAddress)> {
        self.ensure_ip_available()?;
        self.macs.ensure_available()?;
        let ip = self.allocate_ip()?;
        let mac = self.allocate_mac()?;
        Ok((ip, mac))
    }

    /// Rewind to the state of a freshly constructed allocator
    pub fn reset(&mut self) {
        self.cursor = 1;
        self.macs.reset();
    }
}

impl Default for AddressAllocator {
    fn default() -> Self {
        AddressAllocator::new(Subnet::default(), MacPolicy::default(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_subnet() {
        let subnet = Subnet::default();
        assert_eq!(subnet.to_string(), DEFAULT_SUBNET);
        assert_eq!(DEFAULT_SUBNET.parse::<Subnet>().unwrap(), subnet);
        assert_eq!(subnet.host_count(), 254);
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 0, 17)));
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 0, 255)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 1, 17)));
        assert!(!subnet.contains(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_sequential_ip_allocation() {
        let mut allocator = AddressAllocator::default();
        assert_eq!(allocator.allocate_ip().unwrap(), Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(allocator.allocate_ip().unwrap(), Ipv4Addr::new(192, 168, 0, 2));
        assert_eq!(allocator.allocate_ip().unwrap(), Ipv4Addr::new(192, 168, 0, 3));
        assert_eq!(allocator.remaining_hosts(), 251);
    }

    #[test]
    fn test_exhaustion_stops_before_broadcast() {
        let subnet: Subnet = "10.0.0.0/29".parse().unwrap();
        let mut allocator = AddressAllocator::new(subnet, MacPolicy::Random, None);
        let ips: Vec<Ipv4Addr> = (0..6).map(|_| allocator.allocate_ip().unwrap()).collect();
        assert_eq!(ips.last(), Some(&Ipv4Addr::new(10, 0, 0, 6)));
        assert!(matches!(
            allocator.allocate_ip(),
            Err(EngineError::AddressSpaceExhausted { .. })
        ));
        assert_eq!(allocator.remaining_hosts(), 0);
    }

    #[test]
    fn test_failed_pair_allocation_is_atomic() {
        let subnet: Subnet = "10.0.0.0/30".parse().unwrap();
        let mut allocator = AddressAllocator::new(subnet, MacPolicy::Sequential, None);
        allocator.allocate().unwrap();
        allocator.allocate().unwrap();
        assert!(allocator.allocate().is_err());
        // the MAC cursor did not advance on the failed attempt
        assert_eq!(allocator.allocate_mac().unwrap().to_string(), "00:16:3e:00:00:03");
    }

    #[test]
    fn test_reset_rewinds_cursor() {
        let mut allocator = AddressAllocator::default();
        allocator.allocate_ip().unwrap();
        allocator.allocate_ip().unwrap();
        allocator.reset();
        assert_eq!(allocator.allocate_ip().unwrap(), Ipv4Addr::new(192, 168, 0, 1));
    }

    #[test]
    fn test_subnet_rejects_host_bits() {
        assert!(Subnet::new(Ipv4Addr::new(10, 0, 0, 1), 24).is_err());
        assert!("10.0.0.0/40".parse::<Subnet>().is_err());
    }
}
