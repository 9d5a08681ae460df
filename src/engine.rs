//! Engine command surface.
//!
//! An [`Engine`] owns one topology (with its address allocator) and the
//! ARP tables of its devices. Each operation validates everything before
//! mutating, so a failed command leaves the engine exactly as it was.
//! [`SharedEngine`] puts an engine behind a read/write lock for callers on
//! several threads.

use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};

use crate::arp::{ArpEntry, ResolutionCache, WhoHasReply};
use crate::command::{Command, CommandOutput};
use crate::config::{Config, ValidationError};
use crate::delivery::{DeliveryEngine, DeliveryResult, Packet, Protocol};
use crate::error::{EngineError, EngineResult};
use crate::ip::AddressAllocator;
use crate::topology::{Device, DeviceKind, Topology};

/// A simulated network and its delivery machinery
#[derive(Debug, Default)]
pub struct Engine {
    topology: Topology,
    arp: ResolutionCache,
}

impl Engine {
    /// Engine configured from `config`
    pub fn new(config: &Config) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self::with_allocator(config.build_allocator()?))
    }

    pub fn with_allocator(allocator: AddressAllocator) -> Self {
        Engine {
            topology: Topology::new(allocator),
            arp: ResolutionCache::new(),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn arp(&self) -> &ResolutionCache {
        &self.arp
    }

    /// Add a device, generating a `<Kind><n>` name when none is requested
    pub fn add_device(&mut self, kind: DeviceKind, name: Option<&str>) -> EngineResult<Device> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.topology.default_name(kind),
        };
        let device = self.topology.add_device(&name, kind)?;
        self.arp.init(&device.name);
        Ok(device)
    }

    /// Remove a device, its links and every ARP entry that mentions it
    pub fn remove_device(&mut self, name: &str) -> EngineResult<Device> {
        let device = self.topology.remove_device(name)?;
        self.arp.purge(name);
        Ok(device)
    }

    pub fn link(&mut self, a: &str, b: &str) -> EngineResult<()> {
        self.topology.link(a, b)
    }

    pub fn send(
        &mut self,
        source: &str,
        destination: &str,
        protocol: Protocol,
    ) -> EngineResult<DeliveryResult> {
        self.send_packet(&Packet::new(source, destination, protocol))
    }

    pub fn send_packet(&mut self, packet: &Packet) -> EngineResult<DeliveryResult> {
        DeliveryEngine::new(&self.topology, &mut self.arp).send(packet)
    }

    pub fn ping(&mut self, source: &str, destination: &str) -> EngineResult<DeliveryResult> {
        DeliveryEngine::new(&self.topology, &mut self.arp).ping(source, destination)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> EngineResult<bool> {
        self.topology.has_edge(a, b)
    }

    pub fn shortest_path(&self, a: &str, b: &str) -> EngineResult<Option<Vec<String>>> {
        self.topology.shortest_path(a, b)
    }

    pub fn arp_table(&self, name: &str) -> EngineResult<Vec<ArpEntry>> {
        self.topology.require(name)?;
        Ok(self.arp.table(&self.topology, name).unwrap_or_default())
    }

    pub fn who_has(&self, ip: Ipv4Addr) -> WhoHasReply {
        self.arp.who_has(&self.topology, ip)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.topology.devices().into_iter().cloned().collect()
    }

    /// Back to an empty topology with fresh address allocation
    pub fn reset(&mut self) {
        self.topology.reset();
        self.arp.clear();
        info!("Topology reset");
    }

    /// Validate and run a command
    pub fn execute(&mut self, command: Command) -> EngineResult<CommandOutput> {
        command.validate()?;
        debug!("Executing {:?}", command);

        let output = match command {
            Command::AddDevice { kind, name } => CommandOutput::DeviceAdded {
                device: self.add_device(kind, name.as_deref())?,
            },
            Command::RemoveDevice { name } => {
                self.remove_device(&name)?;
                CommandOutput::DeviceRemoved { name }
            }
            Command::Link { a, b } => {
                self.link(&a, &b)?;
                CommandOutput::Linked { a, b }
            }
            Command::Send { source, destination, protocol, data } => {
                let mut packet = Packet::new(&source, &destination, protocol);
                packet.payload = data;
                CommandOutput::Delivery { result: self.send_packet(&packet)? }
            }
            Command::Ping { source, destination } => CommandOutput::Delivery {
                result: self.ping(&source, &destination)?,
            },
            Command::Reset => {
                self.reset();
                CommandOutput::Reset
            }
            command => self.query(command)?,
        };
        Ok(output)
    }

    /// Run a read-only command
    pub fn query(&self, command: Command) -> EngineResult<CommandOutput> {
        command.validate()?;

        let output = match command {
            Command::HasEdge { a, b } => {
                let linked = self.has_edge(&a, &b)?;
                CommandOutput::HasEdge { a, b, linked }
            }
            Command::ShortestPath { a, b } => {
                let path = self.shortest_path(&a, &b)?;
                CommandOutput::Path { a, b, path }
            }
            Command::ArpTable { name } => {
                let entries = self.arp_table(&name)?;
                CommandOutput::ArpTable { name, entries }
            }
            Command::WhoHas { ip } => CommandOutput::WhoHas { reply: self.who_has(ip) },
            Command::ListDevices => CommandOutput::Devices { devices: self.devices() },
            other => {
                return Err(EngineError::InvalidCommand(format!("{:?} is not a query", other)))
            }
        };
        Ok(output)
    }
}

/// Clonable, thread-safe handle to one engine
///
/// Mutating commands take the write lock; `has_edge`, `shortest_path` and
/// the other queries share the read lock.
#[derive(Debug, Clone, Default)]
pub struct SharedEngine {
    inner: Arc<RwLock<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        SharedEngine {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    // Engine state is only touched after validation succeeds, so a panic
    // elsewhere cannot leave it half-updated.
    fn read(&self) -> RwLockReadGuard<'_, Engine> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Engine> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn execute(&self, command: Command) -> EngineResult<CommandOutput> {
        if command.is_mutating() {
            self.write().execute(command)
        } else {
            self.read().query(command)
        }
    }

    pub fn add_device(&self, kind: DeviceKind, name: Option<&str>) -> EngineResult<Device> {
        self.write().add_device(kind, name)
    }

    pub fn remove_device(&self, name: &str) -> EngineResult<Device> {
        self.write().remove_device(name)
    }

    pub fn link(&self, a: &str, b: &str) -> EngineResult<()> {
        self.write().link(a, b)
    }

    pub fn send(
        &self,
        source: &str,
        destination: &str,
        protocol: Protocol,
    ) -> EngineResult<DeliveryResult> {
        self.write().send(source, destination, protocol)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> EngineResult<bool> {
        self.read().has_edge(a, b)
    }

    pub fn shortest_path(&self, a: &str, b: &str) -> EngineResult<Option<Vec<String>>> {
        self.read().shortest_path(a, b)
    }

    pub fn reset(&self) {
        self.write().reset()
    }

    /// Run `f` with shared access to the engine
    pub fn with_engine<T>(&self, f: impl FnOnce(&Engine) -> T) -> T {
        f(&self.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryOutcome;
    use crate::ip::{MacPolicy, Subnet};
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn scenario_engine() -> Engine {
        let mut engine = Engine::default();
        engine.add_device(DeviceKind::Pc, Some("PC0")).unwrap();
        engine.add_device(DeviceKind::Router, Some("Router0")).unwrap();
        engine.add_device(DeviceKind::Server, Some("Server0")).unwrap();
        engine.link("PC0", "Router0").unwrap();
        engine.link("Router0", "Server0").unwrap();
        engine
    }

    #[test]
    fn test_pc_router_server_scenario() {
        let mut engine = scenario_engine();
        let result = engine.send("PC0", "Server0", Protocol::Tcp).unwrap();
        assert!(result.is_delivered());
        assert_eq!(result.path().unwrap(), ["PC0", "Router0", "Server0"]);
        assert_eq!(result.protocol, Protocol::Tcp);
    }

    #[test]
    fn test_reverse_send_hits_cache() {
        let mut engine = scenario_engine();
        let forward = engine.send("PC0", "Server0", Protocol::Udp).unwrap();
        let entries = engine.arp().entry_count();
        let reverse = engine.send("Server0", "PC0", Protocol::Udp).unwrap();

        assert!(matches!(reverse.outcome, DeliveryOutcome::Delivered { cache_hit: true, .. }));
        assert_eq!(engine.arp().entry_count(), entries);
        assert_eq!(forward.mac(), Some(engine.topology().device("Server0").unwrap().mac));
        assert_eq!(reverse.mac(), Some(engine.topology().device("PC0").unwrap().mac));
    }

    #[test]
    fn test_remove_cascade() {
        let mut engine = scenario_engine();
        engine.send("PC0", "Server0", Protocol::Tcp).unwrap();
        engine.send("Router0", "Server0", Protocol::Icmp).unwrap();
        engine.remove_device("Server0").unwrap();

        assert_eq!(engine.has_edge("Router0", "Server0"), Err(EngineError::unknown("Server0")));
        assert_eq!(engine.shortest_path("PC0", "Server0"), Err(EngineError::unknown("Server0")));
        for name in ["PC0", "Router0"] {
            assert!(engine.arp().lookup(name, "Server0").is_none());
            assert!(engine.arp_table(name).unwrap().iter().all(|e| e.peer != "Server0"));
        }
        assert_eq!(engine.arp_table("Server0"), Err(EngineError::unknown("Server0")));
    }

    #[test]
    fn test_failed_commands_leave_state_unchanged() {
        let mut engine = scenario_engine();
        let before = engine.devices();
        let links = engine.topology().links().to_vec();

        assert!(engine.add_device(DeviceKind::Pc, Some("PC0")).is_err());
        assert!(engine.link("PC0", "Router0").is_err());
        assert!(engine.link("PC0", "nowhere").is_err());
        assert!(engine.send("PC0", "nowhere", Protocol::Tcp).is_err());
        assert!(engine.remove_device("nowhere").is_err());

        assert_eq!(engine.devices(), before);
        assert_eq!(engine.topology().links(), links.as_slice());
        assert_eq!(engine.arp().entry_count(), 0);
        let next = engine.add_device(DeviceKind::Pc, None).unwrap();
        assert_eq!(next.ip, Ipv4Addr::new(192, 168, 0, 4));
    }

    #[test]
    fn test_default_names_follow_counter() {
        let mut engine = Engine::default();
        let kinds = [DeviceKind::Pc, DeviceKind::Router, DeviceKind::Server, DeviceKind::Switch];
        let names: Vec<String> = kinds
            .into_iter()
            .map(|kind| engine.add_device(kind, None).unwrap().name)
            .collect();
        assert_eq!(names, ["PC0", "Router1", "Server2", "Switch3"]);
    }

    #[test]
    fn test_reset_matches_fresh_engine() {
        let allocator = || AddressAllocator::new(Subnet::default(), MacPolicy::Random, Some(99));
        let mut engine = Engine::with_allocator(allocator());
        engine.add_device(DeviceKind::Pc, Some("A")).unwrap();
        engine.add_device(DeviceKind::Pc, Some("B")).unwrap();
        engine.reset();
        let after_reset = engine.add_device(DeviceKind::Pc, Some("X")).unwrap();

        let mut fresh = Engine::with_allocator(allocator());
        let first = fresh.add_device(DeviceKind::Pc, Some("X")).unwrap();
        assert_eq!(after_reset, first);
        assert_eq!(engine.arp().entry_count(), 0);
    }

    #[test]
    fn test_execute_commands() {
        let mut engine = Engine::default();
        for name in ["A", "B"] {
            let command = Command::AddDevice { kind: DeviceKind::Pc, name: Some(name.into()) };
            engine.execute(command).unwrap();
        }
        engine.execute(Command::Link { a: "A".into(), b: "B".into() }).unwrap();

        let output = engine
            .execute(Command::Send {
                source: "A".into(),
                destination: "B".into(),
                protocol: Protocol::Udp,
                data: Some("payload".into()),
            })
            .unwrap();
        let CommandOutput::Delivery { result } = output else {
            panic!("expected a delivery, got {:?}", output);
        };
        assert!(matches!(result.outcome, DeliveryOutcome::Delivered { payload_bytes: 7, .. }));

        let output = engine.execute(Command::HasEdge { a: "A".into(), b: "B".into() }).unwrap();
        assert_eq!(output, CommandOutput::HasEdge { a: "A".into(), b: "B".into(), linked: true });

        assert_eq!(engine.execute(Command::Reset).unwrap(), CommandOutput::Reset);
        assert!(engine.devices().is_empty());
    }

    #[test]
    fn test_query_rejects_mutations() {
        let engine = Engine::default();
        assert!(matches!(engine.query(Command::Reset), Err(EngineError::InvalidCommand(_))));
        assert!(matches!(
            engine.query(Command::RemoveDevice { name: "A".into() }),
            Err(EngineError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_shared_engine_concurrent_adds() {
        let shared = SharedEngine::default();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    (0..10)
                        .map(|i| {
                            let name = format!("t{}d{}", t, i);
                            shared.add_device(DeviceKind::Pc, Some(&name)).unwrap().ip
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ips = HashSet::new();
        for handle in handles {
            for ip in handle.join().unwrap() {
                assert!(ips.insert(ip), "duplicate IP {}", ip);
            }
        }
        assert_eq!(ips.len(), 80);
        assert_eq!(shared.with_engine(|e| e.topology().len()), 80);
    }

    #[test]
    fn test_shared_engine_queries() {
        let shared = SharedEngine::new(scenario_engine());
        assert_eq!(shared.has_edge("PC0", "Router0"), Ok(true));
        assert_eq!(shared.shortest_path("PC0", "Server0").unwrap().map(|p| p.len()), Some(3));
        let output = shared.execute(Command::ListDevices).unwrap();
        assert!(matches!(output, CommandOutput::Devices { ref devices } if devices.len() == 3));
        shared.reset();
        assert_eq!(shared.has_edge("PC0", "Router0"), Err(EngineError::unknown("PC0")));
    }

    #[test]
    fn test_shared_engine_recovers_poisoned_lock() {
        let shared = SharedEngine::new(scenario_engine());
        let writer = shared.clone();
        let panicked = thread::spawn(move || {
            let _guard = writer.inner.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(panicked.is_err());
        assert!(shared.inner.is_poisoned());

        let output = shared.execute(Command::ListDevices).unwrap();
        assert!(matches!(output, CommandOutput::Devices { ref devices } if devices.len() == 3));
        let added = shared.add_device(DeviceKind::Pc, Some("PC1")).unwrap();
        assert_eq!(added.ip, Ipv4Addr::new(192, 168, 0, 4));
        shared.link("PC1", "Router0").unwrap();
        assert!(shared.send("PC1", "Server0", Protocol::Tcp).unwrap().is_delivered());
        assert_eq!(shared.with_engine(|e| e.topology().len()), 4);
    }

    #[test]
    fn test_shared_engine_queries_share_read_lock() {
        let shared = SharedEngine::new(scenario_engine());
        let held = shared.read();

        let (tx, rx) = mpsc::channel();
        let reader = shared.clone();
        let handle = thread::spawn(move || {
            let edge = reader.has_edge("PC0", "Router0");
            let path = reader.shortest_path("PC0", "Server0");
            let listed = reader.execute(Command::ListDevices).is_ok();
            tx.send((edge, path, listed)).unwrap();
        });

        // answered while this thread still holds a read guard
        let (edge, path, listed) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(edge, Ok(true));
        assert_eq!(path.unwrap().map(|p| p.len()), Some(3));
        assert!(listed);
        assert_eq!(held.topology().len(), 3);

        drop(held);
        handle.join().unwrap();
    }
}
