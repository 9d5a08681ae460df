//! MAC address type and generation.
//!
//! Every simulated device gets a MAC under the locally-administered OUI
//! `00:16:3e`. The low three octets come either from a pseudo-random
//! generator (the default, uniqueness is only probabilistic and collisions
//! are not checked) or from a sequential cursor that guarantees uniqueness.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{EngineError, EngineResult};

/// OUI prefix shared by every generated MAC address
pub const MAC_OUI: [u8; 3] = [0x00, 0x16, 0x3e];

/// Largest value of the three low octets
const MAX_NIC_SUFFIX: u32 = 0x00ff_ffff;

/// A 48-bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Build a MAC from the shared OUI and a 24-bit NIC suffix
    pub fn from_suffix(suffix: u32) -> Self {
        let [_, a, b, c] = suffix.to_be_bytes();
        MacAddress([MAC_OUI[0], MAC_OUI[1], MAC_OUI[2], a, b, c])
    }

    /// True if the address carries the simulator's OUI
    pub fn has_sim_oui(&self) -> bool {
        self.0[..3] == MAC_OUI
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How the low three octets of a MAC are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacPolicy {
    /// Pseudo-random octets, no collision check
    #[default]
    Random,
    /// Ascending octets from a cursor, guaranteed unique
    Sequential,
}

/// Stateful MAC source for one topology
#[derive(Debug)]
pub struct MacGenerator {
    policy: MacPolicy,
    seed: Option<u64>,
    rng: StdRng,
    next_suffix: u32,
}

impl MacGenerator {
    pub fn new(policy: MacPolicy, seed: Option<u64>) -> Self {
        MacGenerator {
            policy,
            seed,
            rng: Self::make_rng(seed),
            next_suffix: 1,
        }
    }

    fn make_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Check that [`MacGenerator::next_mac`] would succeed
    pub fn ensure_available(&self) -> EngineResult<()> {
        match self.policy {
            MacPolicy::Sequential if self.next_suffix > MAX_NIC_SUFFIX => {
                Err(EngineError::AddressSpaceExhausted {
                    reason: "no sequential MAC addresses left under OUI 00:16:3e".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn next_mac(&mut self) -> EngineResult<MacAddress> {
        self.ensure_available()?;
        let mac = match self.policy {
            MacPolicy::Random => MacAddress([
                MAC_OUI[0],
                MAC_OUI[1],
                MAC_OUI[2],
                self.rng.gen::<u8>(),
                self.rng.gen::<u8>(),
                self.rng.gen::<u8>(),
            ]),
            MacPolicy::Sequential => {
                let mac = MacAddress::from_suffix(self.next_suffix);
                self.next_suffix += 1;
                mac
            }
        };
        Ok(mac)
    }

    /// Rewind to the initial state; a seeded generator replays the same sequence
    pub fn reset(&mut self) {
        self.rng = Self::make_rng(self.seed);
        self.next_suffix = 1;
    }
}
