//! Engine commands.
//!
//! The presentation layer talks to the engine exclusively through
//! [`Command`] values. They come from YAML scenario files (via serde) or
//! from text lines typed into the shell (via [`parse_line`]). Arguments
//! are typed and validated before the engine sees them.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::arp::{ArpEntry, WhoHasReply};
use crate::delivery::{DeliveryResult, Protocol};
use crate::error::{EngineError, EngineResult};
use crate::topology::{Device, DeviceKind};
use crate::utils::validation::validate_device_name;

/// A single engine command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Add a device; without a name one is generated (`PC0`, `Router1`, ...)
    AddDevice {
        kind: DeviceKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    RemoveDevice { name: String },
    Link { a: String, b: String },
    Send {
        source: String,
        destination: String,
        #[serde(default)]
        protocol: Protocol,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    Ping { source: String, destination: String },
    HasEdge { a: String, b: String },
    ShortestPath { a: String, b: String },
    ArpTable { name: String },
    WhoHas { ip: Ipv4Addr },
    ListDevices,
    Reset,
}

impl Command {
    /// Whether the command can change engine state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::HasEdge { .. }
                | Command::ShortestPath { .. }
                | Command::ArpTable { .. }
                | Command::WhoHas { .. }
                | Command::ListDevices
        )
    }

    /// Check every device name argument
    pub fn validate(&self) -> EngineResult<()> {
        let names: Vec<&str> = match self {
            Command::AddDevice { name, .. } => name.iter().map(String::as_str).collect(),
            Command::RemoveDevice { name } | Command::ArpTable { name } => vec![name.as_str()],
            Command::Link { a, b } | Command::HasEdge { a, b } | Command::ShortestPath { a, b } => {
                vec![a.as_str(), b.as_str()]
            }
            Command::Send { source, destination, .. } | Command::Ping { source, destination } => {
                vec![source.as_str(), destination.as_str()]
            }
            Command::WhoHas { .. } | Command::ListDevices | Command::Reset => Vec::new(),
        };
        names.into_iter().try_for_each(validate_device_name)
    }
}

/// Parse one shell line
///
/// Returns `Ok(None)` for blank lines and `#` comments. Grammar:
///
/// ```text
/// add <kind> [name]            remove <name>
/// link <a> <b>                 send <src> <dst> <protocol> [data...]
/// ping <src> <dst>             edge <a> <b>
/// path <a> <b>                 arp <name>
/// whohas <ip>                  list
/// reset
/// ```
pub fn parse_line(line: &str) -> EngineResult<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    let (verb, args) = (words[0].to_ascii_lowercase(), &words[1..]);
    let usage = |text: &str| EngineError::InvalidCommand(format!("usage: {}", text));

    let command = match (verb.as_str(), args) {
        ("add", [kind]) => Command::AddDevice { kind: kind.parse()?, name: None },
        ("add", [kind, name]) => Command::AddDevice {
            kind: kind.parse()?,
            name: Some(name.to_string()),
        },
        ("add", _) => return Err(usage("add <kind> [name]")),
        ("remove", [name]) => Command::RemoveDevice { name: name.to_string() },
        ("remove", _) => return Err(usage("remove <name>")),
        ("link", [a, b]) => Command::Link { a: a.to_string(), b: b.to_string() },
        ("link", _) => return Err(usage("link <a> <b>")),
        ("send", [source, destination, protocol, data @ ..]) => Command::Send {
            source: source.to_string(),
            destination: destination.to_string(),
            protocol: protocol.parse()?,
            data: if data.is_empty() { None } else { Some(data.join(" ")) },
        },
        ("send", _) => return Err(usage("send <src> <dst> <protocol> [data...]")),
        ("ping", [source, destination]) => Command::Ping {
            source: source.to_string(),
            destination: destination.to_string(),
        },
        ("ping", _) => return Err(usage("ping <src> <dst>")),
        ("edge", [a, b]) => Command::HasEdge { a: a.to_string(), b: b.to_string() },
        ("edge", _) => return Err(usage("edge <a> <b>")),
        ("path", [a, b]) => Command::ShortestPath { a: a.to_string(), b: b.to_string() },
        ("path", _) => return Err(usage("path <a> <b>")),
        ("arp", [name]) => Command::ArpTable { name: name.to_string() },
        ("arp", _) => return Err(usage("arp <name>")),
        ("whohas", [ip]) => Command::WhoHas {
            ip: ip.parse().map_err(|_| {
                EngineError::InvalidCommand(format!("'{}' is not an IPv4 address", ip))
            })?,
        },
        ("whohas", _) => return Err(usage("whohas <ip>")),
        ("list", []) => Command::ListDevices,
        ("reset", []) => Command::Reset,
        ("list", _) | ("reset", _) => {
            return Err(EngineError::InvalidCommand(format!("'{}' takes no arguments", verb)))
        }
        _ => {
            return Err(EngineError::InvalidCommand(format!("unknown command '{}'", words[0])))
        }
    };

    command.validate()?;
    Ok(Some(command))
}

/// Result of a successfully executed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    DeviceAdded { device: Device },
    DeviceRemoved { name: String },
    Linked { a: String, b: String },
    Delivery { result: DeliveryResult },
    HasEdge { a: String, b: String, linked: bool },
    Path { a: String, b: String, path: Option<Vec<String>> },
    ArpTable { name: String, entries: Vec<ArpEntry> },
    WhoHas { reply: WhoHasReply },
    Devices { devices: Vec<Device> },
    Reset,
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::DeviceAdded { device } => write!(f, "Added {}", device),
            CommandOutput::DeviceRemoved { name } => write!(f, "Removed {}", name),
            CommandOutput::Linked { a, b } => write!(f, "Linked {} and {}", a, b),
            CommandOutput::Delivery { result } => write!(f, "{}", result),
            CommandOutput::HasEdge { a, b, linked } => {
                let verb = if *linked { "are" } else { "are not" };
                write!(f, "{} and {} {} directly linked", a, b, verb)
            }
            CommandOutput::Path { a, b, path: Some(path) } => {
                write!(f, "Path {} -> {}: {}", a, b, path.join(" -> "))
            }
            CommandOutput::Path { a, b, path: None } => {
                write!(f, "No route between {} and {}", a, b)
            }
            CommandOutput::ArpTable { name, entries } if entries.is_empty() => {
                write!(f, "ARP table of {} is empty", name)
            }
            CommandOutput::ArpTable { name, entries } => {
                write!(f, "ARP table of {}:", name)?;
                for entry in entries {
                    write!(f, "\n  {:<16} {:<15} {}", entry.peer, entry.ip, entry.mac)?;
                }
                Ok(())
            }
            CommandOutput::WhoHas { reply: WhoHasReply::Known { ip, name, mac } } => {
                write!(f, "ARP response: {} is at {} ({})", ip, mac, name)
            }
            CommandOutput::WhoHas { reply: WhoHasReply::Unanswered { ip } } => {
                write!(f, "ARP request: who has {}? (no reply)", ip)
            }
            CommandOutput::WhoHas { reply: WhoHasReply::OffSubnet { ip, subnet } } => {
                write!(f, "ARP request not sent: {} is outside {}", ip, subnet)
            }
            CommandOutput::Devices { devices } if devices.is_empty() => write!(f, "No devices"),
            CommandOutput::Devices { devices } => {
                let lines: Vec<String> = devices.iter().map(|d| format!("  {}", d)).collect();
                write!(f, "{} device(s):\n{}", devices.len(), lines.join("\n"))
            }
            CommandOutput::Reset => write!(f, "Topology reset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        assert_eq!(
            parse_line("add pc").unwrap(),
            Some(Command::AddDevice { kind: DeviceKind::Pc, name: None })
        );
        assert_eq!(
            parse_line("  ADD Router core1 ").unwrap(),
            Some(Command::AddDevice { kind: DeviceKind::Router, name: Some("core1".to_string()) })
        );
        assert!(matches!(parse_line("add toaster"), Err(EngineError::InvalidDeviceKind(_))));
        assert!(matches!(parse_line("add"), Err(EngineError::InvalidCommand(_))));
    }

    #[test]
    fn test_parse_send_with_data() {
        assert_eq!(
            parse_line("send PC0 Server0 tcp hello there").unwrap(),
            Some(Command::Send {
                source: "PC0".to_string(),
                destination: "Server0".to_string(),
                protocol: Protocol::Tcp,
                data: Some("hello there".to_string()),
            })
        );
        assert!(matches!(
            parse_line("send PC0 Server0 smtp"),
            Err(EngineError::InvalidProtocol(_))
        ));
        assert!(matches!(parse_line("send PC0 Server0"), Err(EngineError::InvalidCommand(_))));
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("# comment").unwrap(), None);
        assert_eq!(parse_line("list").unwrap(), Some(Command::ListDevices));
        assert_eq!(parse_line("reset").unwrap(), Some(Command::Reset));
        assert_eq!(
            parse_line("whohas 192.168.0.3").unwrap(),
            Some(Command::WhoHas { ip: Ipv4Addr::new(192, 168, 0, 3) })
        );
        assert!(parse_line("whohas nowhere").is_err());
        assert!(parse_line("reset now").is_err());
        assert!(matches!(parse_line("frobnicate"), Err(EngineError::InvalidCommand(_))));
    }

    #[test]
    fn test_names_validated_upfront() {
        assert!(matches!(parse_line("link PC0 -bad"), Err(EngineError::InvalidName { .. })));
        let command = Command::RemoveDevice { name: String::new() };
        assert!(command.validate().is_err());
    }

    #[test]
    fn test_yaml_commands() {
        let yaml = r#"
- op: add_device
  kind: server
- op: send
  source: A
  destination: B
- op: who_has
  ip: 10.0.0.1
- op: reset
"#;
        let commands: Vec<Command> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(commands[0], Command::AddDevice { kind: DeviceKind::Server, name: None });
        assert!(matches!(
            commands[1],
            Command::Send { protocol: Protocol::Generic, data: None, .. }
        ));
        assert_eq!(commands[2], Command::WhoHas { ip: Ipv4Addr::new(10, 0, 0, 1) });
        assert_eq!(commands[3], Command::Reset);
    }

    #[test]
    fn test_who_has_display() {
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        let unanswered = CommandOutput::WhoHas { reply: WhoHasReply::Unanswered { ip } };
        assert_eq!(unanswered.to_string(), "ARP request: who has 10.0.0.1? (no reply)");

        let off_subnet = CommandOutput::WhoHas {
            reply: WhoHasReply::OffSubnet { ip, subnet: "192.168.0.0/24".to_string() },
        };
        assert_eq!(
            off_subnet.to_string(),
            "ARP request not sent: 10.0.0.1 is outside 192.168.0.0/24"
        );
    }

    #[test]
    fn test_mutating_classification() {
        assert!(Command::Reset.is_mutating());
        assert!(Command::Ping { source: "A".into(), destination: "B".into() }.is_mutating());
        assert!(!Command::ListDevices.is_mutating());
        assert!(!Command::HasEdge { a: "A".into(), b: "B".into() }.is_mutating());
    }
}
