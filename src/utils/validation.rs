//! Input validation utilities.
//!
//! Device names arrive from free-form input (scenario files, the shell),
//! so they are checked once, before any command touches the topology.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EngineError, EngineResult};

/// Longest accepted device name
pub const MAX_NAME_LEN: usize = 32;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("Invalid device name regex")
);

/// Validate a device name
///
/// Names start with an ASCII letter or digit, continue with letters,
/// digits, `_`, `.` or `-`, and are at most [`MAX_NAME_LEN`] characters.
///
/// # Examples
/// ```
/// use vnetsim::utils::validation::validate_device_name;
///
/// assert!(validate_device_name("Router0").is_ok());
/// assert!(validate_device_name("core-sw.1").is_ok());
/// assert!(validate_device_name("").is_err());
/// assert!(validate_device_name("my pc").is_err());
/// ```
pub fn validate_device_name(name: &str) -> EngineResult<()> {
    let invalid = |reason: &str| EngineError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(&format!("name is longer than {} characters", MAX_NAME_LEN)));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(invalid(
            "only letters, digits, '_', '.' and '-' are allowed, starting with a letter or digit",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["PC0", "Router12", "srv_a", "edge-1", "10.0.0.1", "x"] {
            assert!(validate_device_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", " PC0", "PC 0", "-lead", "_lead", "pc/0", "ünï"] {
            assert!(
                matches!(validate_device_name(name), Err(EngineError::InvalidName { .. })),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_length_limit() {
        let name = "a".repeat(MAX_NAME_LEN);
        assert!(validate_device_name(&name).is_ok());
        let name = "a".repeat(MAX_NAME_LEN + 1);
        assert!(validate_device_name(&name).is_err());
    }
}
