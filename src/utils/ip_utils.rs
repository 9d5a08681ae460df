use std::net::Ipv4Addr;

/// IP utility functions for validation and CIDR handling

/// Parse a CIDR block such as `192.168.0.0/24` into its network address and prefix length
///
/// The address part must be the network address itself (no host bits set).
///
/// # Examples
/// ```
/// use vnetsim::utils::ip_utils::parse_cidr;
/// use std::net::Ipv4Addr;
///
/// assert_eq!(parse_cidr("10.0.0.0/8"), Ok((Ipv4Addr::new(10, 0, 0, 0), 8)));
/// assert!(parse_cidr("10.0.0.1/8").is_err());
/// assert!(parse_cidr("10.0.0.0").is_err());
/// ```
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8), String> {
    let (addr, prefix) = cidr
        .trim()
        .split_once('/')
        .ok_or_else(|| format!("'{}' is not in CIDR notation (expected a.b.c.d/len)", cidr))?;

    let network: Ipv4Addr = addr
        .parse()
        .map_err(|_| format!("Invalid IPv4 address '{}'", addr))?;
    let prefix_len: u8 = prefix
        .parse()
        .map_err(|_| format!("Invalid prefix length '{}'", prefix))?;
    if prefix_len > 32 {
        return Err(format!("Prefix length {} is out of range", prefix_len));
    }

    if u32::from(network) & !prefix_mask(prefix_len) != 0 {
        return Err(format!("{} has host bits set for a /{} network", network, prefix_len));
    }

    Ok((network, prefix_len))
}

/// Netmask for a prefix length, as a host-order integer
pub fn prefix_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        len if len >= 32 => u32::MAX,
        len => u32::MAX << (32 - len),
    }
}

/// Number of addresses in a block of the given prefix length (network and broadcast included)
pub fn block_size(prefix_len: u8) -> u64 {
    1u64 << (32 - u32::from(prefix_len.min(32)))
}

/// Format an IPv4 address with a prefix length
pub fn format_with_prefix(ip: Ipv4Addr, prefix_len: u8) -> String {
    format!("{}/{}", ip, prefix_len)
}
