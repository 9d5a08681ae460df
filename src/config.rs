use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::ip::{AddressAllocator, MacPolicy, Subnet, DEFAULT_SUBNET};

/// Log levels accepted in `general.log_level`
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Engine configuration; every section is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub addressing: AddressingConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = &self.general.log_level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ValidationError::InvalidGeneral(format!(
                    "log_level '{}' must be one of {}",
                    level,
                    LOG_LEVELS.join(", ")
                )));
            }
        }

        let subnet = self.subnet()?;
        if !(8..=30).contains(&subnet.prefix_len()) {
            return Err(ValidationError::InvalidNetwork(format!(
                "subnet {} must have a prefix length between 8 and 30",
                subnet
            )));
        }

        if self.addressing.mac_seed.is_some()
            && self.addressing.mac_policy == MacPolicy::Sequential
        {
            log::warn!("addressing.mac_seed has no effect with the sequential MAC policy");
        }

        Ok(())
    }

    /// `general.log_level` as a `log` filter, if set and recognised
    pub fn log_level_filter(&self) -> Option<LevelFilter> {
        self.general.log_level.as_deref()?.parse().ok()
    }

    /// The configured subnet, parsed
    pub fn subnet(&self) -> Result<Subnet, ValidationError> {
        self.network.subnet.parse().map_err(|e| {
            ValidationError::InvalidNetwork(format!("subnet '{}': {}", self.network.subnet, e))
        })
    }

    /// Build the address allocator described by this configuration
    pub fn build_allocator(&self) -> Result<AddressAllocator, ValidationError> {
        Ok(AddressAllocator::new(
            self.subnet()?,
            self.addressing.mac_policy,
            self.addressing.mac_seed,
        ))
    }
}

/// General settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Network settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Subnet devices draw their IPs from, in CIDR notation
    #[serde(default = "default_subnet")]
    pub subnet: String,
}

/// MAC addressing settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AddressingConfig {
    #[serde(default)]
    pub mac_policy: MacPolicy,
    /// Seed for the random MAC policy; unseeded runs draw from OS entropy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_seed: Option<u64>,
}

fn default_subnet() -> String {
    DEFAULT_SUBNET.to_string()
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
}

/// Default implementations
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
        }
    }
}
