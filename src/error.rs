//! Engine error taxonomy.
//!
//! Every command either applies fully or returns one of these errors with
//! the engine left untouched. `NoRoute` is deliberately absent: an
//! unreachable destination is a normal delivery outcome, see
//! [`crate::delivery::DeliveryOutcome`].

/// Errors returned by engine commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Device name already in use: {name}")]
    DuplicateName { name: String },

    #[error("Unknown device: {name}")]
    UnknownDevice { name: String },

    #[error("Cannot link device {name} to itself")]
    SelfLink { name: String },

    #[error("Devices {a} and {b} are already linked")]
    DuplicateLink { a: String, b: String },

    #[error("Address space exhausted: {reason}")]
    AddressSpaceExhausted { reason: String },

    #[error("Invalid device name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Unknown protocol '{0}' (expected tcp, udp, icmp or generic)")]
    InvalidProtocol(String),

    #[error("Unknown device kind '{0}' (expected pc, router, server or switch)")]
    InvalidDeviceKind(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl EngineError {
    pub(crate) fn unknown(name: &str) -> Self {
        EngineError::UnknownDevice { name: name.to_string() }
    }

    /// True for conditions a user can run into with well-formed input
    /// (as opposed to caller misuse such as unknown or duplicate names).
    pub fn is_user_facing(&self) -> bool {
        matches!(self, EngineError::AddressSpaceExhausted { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        let exhausted = EngineError::AddressSpaceExhausted { reason: "subnet full".to_string() };
        assert!(exhausted.is_user_facing());
        assert!(!EngineError::unknown("PC0").is_user_facing());
        assert!(!EngineError::DuplicateName { name: "PC0".to_string() }.is_user_facing());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(EngineError::unknown("PC9").to_string(), "Unknown device: PC9");
        let err = EngineError::DuplicateLink { a: "A".to_string(), b: "B".to_string() };
        assert_eq!(err.to_string(), "Devices A and B are already linked");
    }
}
